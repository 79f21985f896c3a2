//! Normalized event vocabulary
//!
//! Everything the node reports, and every change in subscription health,
//! reaches the rest of the program as an `Event`.

mod topic;

pub use topic::Topic;

use serde::Serialize;

use crate::store::{Channel, ChannelId};

/// One normalized notification.
///
/// `sequence` is assigned per topic by the normalizer, starting at 1, and is
/// strictly increasing within a topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub topic: Topic,
    pub sequence: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    ChannelOpened(Channel),
    ChannelClosed {
        channel_id: ChannelId,
    },
    ChannelActiveChanged {
        channel_id: ChannelId,
        active: bool,
    },
    /// Latest polled state of one channel; `update_counter` orders polls.
    BalanceUpdated(Channel),
    HtlcSettled {
        incoming_channel: u64,
        outgoing_channel: u64,
        timestamp_ns: u64,
    },
    InvoiceUpdated {
        payment_hash: String,
        value_sat: i64,
        amount_paid_sat: i64,
        state: InvoiceState,
    },
    TransactionSeen {
        tx_hash: String,
        amount_sat: i64,
        confirmations: i64,
        block_height: i64,
    },
    StreamDegraded {
        retries: u32,
        reason: String,
    },
    StreamRecovered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Open,
    Settled,
    Canceled,
    Accepted,
}

impl InvoiceState {
    pub fn from_lnd(value: &str) -> Option<Self> {
        match value {
            "OPEN" => Some(InvoiceState::Open),
            "SETTLED" => Some(InvoiceState::Settled),
            "CANCELED" => Some(InvoiceState::Canceled),
            "ACCEPTED" => Some(InvoiceState::Accepted),
            _ => None,
        }
    }

    pub fn from_index(value: i64) -> Option<Self> {
        match value {
            0 => Some(InvoiceState::Open),
            1 => Some(InvoiceState::Settled),
            2 => Some(InvoiceState::Canceled),
            3 => Some(InvoiceState::Accepted),
            _ => None,
        }
    }
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ChannelOpened(_) => "ChannelOpened",
            EventKind::ChannelClosed { .. } => "ChannelClosed",
            EventKind::ChannelActiveChanged { .. } => "ChannelActiveChanged",
            EventKind::BalanceUpdated(_) => "BalanceUpdated",
            EventKind::HtlcSettled { .. } => "HtlcSettled",
            EventKind::InvoiceUpdated { .. } => "InvoiceUpdated",
            EventKind::TransactionSeen { .. } => "TransactionSeen",
            EventKind::StreamDegraded { .. } => "StreamDegraded",
            EventKind::StreamRecovered => "StreamRecovered",
        }
    }

    /// Health events bypass data backpressure in the hub queue.
    pub fn is_health_signal(&self) -> bool {
        matches!(
            self,
            EventKind::StreamDegraded { .. } | EventKind::StreamRecovered
        )
    }
}

impl Event {
    /// One-line description for the event feed and pubsub mode.
    pub fn summary(&self) -> String {
        let detail = match &self.kind {
            EventKind::ChannelOpened(channel) => format!(
                "{} capacity={} local={} remote={}",
                channel.id, channel.capacity, channel.local_balance, channel.remote_balance
            ),
            EventKind::ChannelClosed { channel_id } => channel_id.to_string(),
            EventKind::ChannelActiveChanged { channel_id, active } => {
                format!("{} active={}", channel_id, active)
            }
            EventKind::BalanceUpdated(channel) => format!(
                "{} local={} remote={} updates={}",
                channel.id, channel.local_balance, channel.remote_balance, channel.update_counter
            ),
            EventKind::HtlcSettled {
                incoming_channel,
                outgoing_channel,
                ..
            } => format!("{} -> {}", incoming_channel, outgoing_channel),
            EventKind::InvoiceUpdated {
                payment_hash,
                value_sat,
                amount_paid_sat,
                state,
            } => format!(
                "{} value={} paid={} state={:?}",
                short_hash(payment_hash),
                value_sat,
                amount_paid_sat,
                state
            ),
            EventKind::TransactionSeen {
                tx_hash,
                amount_sat,
                confirmations,
                ..
            } => format!(
                "{} amount={} confs={}",
                short_hash(tx_hash),
                amount_sat,
                confirmations
            ),
            EventKind::StreamDegraded { retries, reason } => {
                format!("after {} retries: {}", retries, reason)
            }
            EventKind::StreamRecovered => String::new(),
        };
        format!(
            "[{} #{}] {} {}",
            self.topic,
            self.sequence,
            self.kind.name(),
            detail
        )
        .trim_end()
        .to_string()
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}
