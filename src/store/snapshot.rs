/// In-memory model of the node
///
/// A `Snapshot` is never mutated once published: the store clones, edits and
/// swaps a fresh `Arc<Snapshot>` for every applied event.
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::events::Topic;

/// Channel point, `funding_txid:output_index`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(funding_txid: &str, output_index: u32) -> Self {
        Self(format!("{}:{}", funding_txid, output_index))
    }

    /// Accepts `txid:index` with a non-empty txid and a numeric index.
    pub fn parse(channel_point: &str) -> Option<Self> {
        let (txid, index) = channel_point.rsplit_once(':')?;
        if txid.is_empty() {
            return None;
        }
        let index: u32 = index.parse().ok()?;
        Some(Self::new(txid, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub id: ChannelId,
    pub short_channel_id: u64,
    /// Remote node public key
    pub remote_party: String,
    pub capacity: i64,
    pub local_balance: i64,
    pub remote_balance: i64,
    pub active: bool,
    pub private: bool,
    /// Commitment update count reported by the node
    pub update_counter: u64,
    /// Fee paid by the funder for the current commitment
    pub commit_fee: i64,
    pub commit_weight: i64,
    pub fee_per_kw: i64,
    /// Value locked in pending HTLCs
    pub unsettled_balance: i64,
    pub total_sent: i64,
    pub total_received: i64,
    pub csv_delay: u32,
    pub pending_htlcs: usize,
}

impl Channel {
    /// Placeholder for a channel first seen through an update event.
    pub fn unknown(id: ChannelId) -> Self {
        Self {
            id,
            short_channel_id: 0,
            remote_party: String::new(),
            capacity: 0,
            local_balance: 0,
            remote_balance: 0,
            active: false,
            private: false,
            update_counter: 0,
            commit_fee: 0,
            commit_weight: 0,
            fee_per_kw: 0,
            unsettled_balance: 0,
            total_sent: 0,
            total_received: 0,
            csv_delay: 0,
            pending_htlcs: 0,
        }
    }
}

/// Wallet-level channel balance, `/v1/balance/channels`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelBalance {
    pub balance: i64,
    pub pending_open_balance: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub alias: String,
    pub pubkey: String,
    pub block_height: u32,
    pub synced_to_chain: bool,
    pub version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub capacity: i64,
    pub local_balance: i64,
    pub remote_balance: i64,
    pub active: usize,
    pub inactive: usize,
    pub unsettled_balance: i64,
    pub commit_fees: i64,
    pub total_sent: i64,
    pub total_received: i64,
    pub pending_htlcs: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub htlcs_settled: u64,
    pub invoices_settled: u64,
    pub transactions_seen: u64,
    pub last_block_height: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub channels: BTreeMap<ChannelId, Channel>,
    pub totals: Totals,
    pub node: NodeInfo,
    pub balance: ChannelBalance,
    pub activity: Activity,
    pub degraded_topics: BTreeSet<Topic>,
}

impl Snapshot {
    pub fn with_channels(channels: impl IntoIterator<Item = Channel>) -> Self {
        let mut snapshot = Self {
            channels: channels.into_iter().map(|c| (c.id.clone(), c)).collect(),
            ..Default::default()
        };
        snapshot.recompute_totals();
        snapshot
    }

    /// Merge another partial snapshot into this one.
    ///
    /// Channels from `other` replace ours with the same id. Node info is taken
    /// from `other` when it carries a pubkey, the wallet balance when it is
    /// non-zero.
    pub fn merge(&mut self, other: Snapshot) {
        self.channels.extend(other.channels);
        if !other.node.pubkey.is_empty() {
            self.node = other.node;
        }
        if other.balance != ChannelBalance::default() {
            self.balance = other.balance;
        }
        self.recompute_totals();
    }

    pub fn recompute_totals(&mut self) {
        let mut totals = Totals::default();
        for channel in self.channels.values() {
            totals.capacity += channel.capacity;
            totals.local_balance += channel.local_balance;
            totals.remote_balance += channel.remote_balance;
            totals.unsettled_balance += channel.unsettled_balance;
            totals.commit_fees += channel.commit_fee;
            totals.total_sent += channel.total_sent;
            totals.total_received += channel.total_received;
            totals.pending_htlcs += channel.pending_htlcs;
            if channel.active {
                totals.active += 1;
            } else {
                totals.inactive += 1;
            }
        }
        self.totals = totals;
    }

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }
}
