/// Payload decoders, one per topic
///
/// Field names follow the LND REST JSON encoding. 64-bit integers arrive as
/// JSON strings, smaller ones as numbers; both are accepted everywhere.
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::errors::MalformedPayload;
use crate::events::{EventKind, InvoiceState, Topic};
use crate::store::{Channel, ChannelBalance, ChannelId};

type Object = Map<String, Value>;

/// Decode one payload. Pure; never panics on any JSON input.
pub fn decode(topic: Topic, payload: &Value) -> Result<EventKind, MalformedPayload> {
    let object = payload
        .as_object()
        .ok_or_else(|| MalformedPayload::new(topic, "payload is not an object"))?;

    let result = match topic {
        Topic::ChannelState => decode_channel_state(object),
        Topic::ChannelGraph => decode_graph(object),
        Topic::ChannelBalances => decode_balance(object),
        Topic::Htlcs => decode_htlc(object),
        Topic::Invoices => decode_invoice(object),
        Topic::Transactions => decode_transaction(object),
    };
    result.map_err(|reason| MalformedPayload::new(topic, reason))
}

/// Channel object as returned by `/v1/channels` and `OPEN_CHANNEL` updates.
pub fn decode_channel(value: &Value) -> Result<Channel, String> {
    let object = value.as_object().ok_or("channel is not an object")?;
    let point = str_field(object, "channel_point").ok_or("missing channel_point")?;
    let id = ChannelId::parse(point).ok_or_else(|| format!("bad channel_point '{}'", point))?;

    Ok(Channel {
        id,
        short_channel_id: uint_field(object, "chan_id").unwrap_or(0),
        remote_party: str_field(object, "remote_pubkey").unwrap_or_default().to_string(),
        capacity: int_field(object, "capacity").unwrap_or(0),
        local_balance: int_field(object, "local_balance").unwrap_or(0),
        remote_balance: int_field(object, "remote_balance").unwrap_or(0),
        active: bool_field(object, "active"),
        private: bool_field(object, "private"),
        update_counter: uint_field(object, "num_updates").unwrap_or(0),
        commit_fee: int_field(object, "commit_fee").unwrap_or(0),
        commit_weight: int_field(object, "commit_weight").unwrap_or(0),
        fee_per_kw: int_field(object, "fee_per_kw").unwrap_or(0),
        unsettled_balance: int_field(object, "unsettled_balance").unwrap_or(0),
        total_sent: int_field(object, "total_satoshis_sent").unwrap_or(0),
        total_received: int_field(object, "total_satoshis_received").unwrap_or(0),
        csv_delay: csv_delay(object),
        pending_htlcs: object
            .get("pending_htlcs")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
    })
}

/// Top-level `csv_delay` was moved under `local_constraints` in newer LND.
fn csv_delay(object: &Object) -> u32 {
    uint_field(object, "csv_delay")
        .or_else(|| {
            object
                .get("local_constraints")
                .and_then(Value::as_object)
                .and_then(|c| uint_field(c, "csv_delay"))
        })
        .and_then(|d| u32::try_from(d).ok())
        .unwrap_or(0)
}

/// `/v1/balance/channels` response
pub fn decode_channel_balance(value: &Value) -> Result<ChannelBalance, String> {
    let object = value.as_object().ok_or("balance is not an object")?;
    Ok(ChannelBalance {
        balance: int_field(object, "balance").unwrap_or(0),
        pending_open_balance: int_field(object, "pending_open_balance").unwrap_or(0),
    })
}

fn decode_channel_state(object: &Object) -> Result<EventKind, String> {
    let kind = str_field(object, "type").ok_or("missing type")?;
    match kind {
        "OPEN_CHANNEL" => {
            let channel = object.get("open_channel").ok_or("missing open_channel")?;
            Ok(EventKind::ChannelOpened(decode_channel(channel)?))
        }
        "CLOSED_CHANNEL" => {
            let summary = object
                .get("closed_channel")
                .and_then(Value::as_object)
                .ok_or("missing closed_channel")?;
            let point = str_field(summary, "channel_point").ok_or("missing channel_point")?;
            let channel_id =
                ChannelId::parse(point).ok_or_else(|| format!("bad channel_point '{}'", point))?;
            Ok(EventKind::ChannelClosed { channel_id })
        }
        "ACTIVE_CHANNEL" | "INACTIVE_CHANNEL" => {
            let active = kind == "ACTIVE_CHANNEL";
            let key = if active { "active_channel" } else { "inactive_channel" };
            let point = object.get(key).ok_or_else(|| format!("missing {}", key))?;
            Ok(EventKind::ChannelActiveChanged {
                channel_id: channel_point(point)?,
                active,
            })
        }
        other => Err(format!("unhandled channel event type {}", other)),
    }
}

fn decode_graph(object: &Object) -> Result<EventKind, String> {
    if let Some(closed) = object.get("closed_chan").and_then(Value::as_object) {
        let point = closed.get("chan_point").ok_or("missing chan_point")?;
        return Ok(EventKind::ChannelClosed {
            channel_id: channel_point(point)?,
        });
    }
    if object.contains_key("channel_update") {
        return Err("edge update".to_string());
    }
    Err("no closed_chan".to_string())
}

fn decode_balance(object: &Object) -> Result<EventKind, String> {
    let channel = decode_channel(&Value::Object(object.clone()))?;
    Ok(EventKind::BalanceUpdated(channel))
}

fn decode_htlc(object: &Object) -> Result<EventKind, String> {
    if !object.get("settle_event").map_or(false, |v| !v.is_null()) {
        return Err("not a settle event".to_string());
    }
    Ok(EventKind::HtlcSettled {
        incoming_channel: uint_field(object, "incoming_channel_id").unwrap_or(0),
        outgoing_channel: uint_field(object, "outgoing_channel_id").unwrap_or(0),
        timestamp_ns: uint_field(object, "timestamp_ns").unwrap_or(0),
    })
}

fn decode_invoice(object: &Object) -> Result<EventKind, String> {
    let r_hash = str_field(object, "r_hash").ok_or("missing r_hash")?;
    let hash_bytes = STANDARD
        .decode(r_hash)
        .map_err(|e| format!("bad r_hash: {}", e))?;

    let state = match object.get("state") {
        Some(Value::String(name)) => InvoiceState::from_lnd(name),
        Some(Value::Number(n)) => n.as_i64().and_then(InvoiceState::from_index),
        _ => None,
    }
    .ok_or("missing or unknown state")?;

    Ok(EventKind::InvoiceUpdated {
        payment_hash: hex::encode(hash_bytes),
        value_sat: int_field(object, "value").unwrap_or(0),
        amount_paid_sat: int_field(object, "amt_paid_sat").unwrap_or(0),
        state,
    })
}

fn decode_transaction(object: &Object) -> Result<EventKind, String> {
    let tx_hash = str_field(object, "tx_hash").ok_or("missing tx_hash")?;
    if tx_hash.is_empty() {
        return Err("empty tx_hash".to_string());
    }
    Ok(EventKind::TransactionSeen {
        tx_hash: tx_hash.to_string(),
        amount_sat: int_field(object, "amount").unwrap_or(0),
        confirmations: int_field(object, "num_confirmations").unwrap_or(0),
        block_height: int_field(object, "block_height").unwrap_or(0),
    })
}

/// `ChannelPoint` message or a `txid:index` string.
///
/// `funding_txid_bytes` is the txid in internal byte order, base64 encoded;
/// the display form is the reversed bytes in hex.
fn channel_point(value: &Value) -> Result<ChannelId, String> {
    if let Some(point) = value.as_str() {
        return ChannelId::parse(point).ok_or_else(|| format!("bad channel point '{}'", point));
    }
    let object = value.as_object().ok_or("channel point is not an object")?;
    let index = uint_field(object, "output_index").unwrap_or(0);
    let index = u32::try_from(index).map_err(|_| "output_index out of range".to_string())?;

    let txid = if let Some(txid) = str_field(object, "funding_txid_str").filter(|s| !s.is_empty()) {
        txid.to_string()
    } else {
        let encoded = str_field(object, "funding_txid_bytes").ok_or("missing funding txid")?;
        let mut bytes = STANDARD
            .decode(encoded)
            .map_err(|e| format!("bad funding_txid_bytes: {}", e))?;
        if bytes.is_empty() {
            return Err("empty funding txid".to_string());
        }
        bytes.reverse();
        hex::encode(bytes)
    };
    Ok(ChannelId::new(&txid, index))
}

fn str_field<'a>(object: &'a Object, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn int_field(object: &Object, key: &str) -> Option<i64> {
    match object.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn uint_field(object: &Object, key: &str) -> Option<u64> {
    match object.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn bool_field(object: &Object, key: &str) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or(false)
}
