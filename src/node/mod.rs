//! Node client
//!
//! The node is an opaque capability: "give me the current value of query Y"
//! and "give me a stream of topic X". `LndClient` implements it against the
//! LND REST interface; tests use `testing::ScriptedNode`.

mod lnd;
pub mod stream;
#[cfg(test)]
pub mod testing;

pub use lnd::LndClient;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::errors::NodeResult;
use crate::events::Topic;
use crate::store::Snapshot;

/// Snapshot queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Open channels with balances
    Channels,
    /// Alias, pubkey, chain height and sync state
    NodeInfo,
    /// Wallet-wide channel balance, including pending opens
    ChannelBalance,
}

/// One undecoded notification as delivered by the node
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    pub topic: Topic,
    pub payload: Value,
}

impl RawNotification {
    pub fn new(topic: Topic, payload: Value) -> Self {
        Self { topic, payload }
    }
}

/// Lazy, unbounded stream of notifications for one topic.
///
/// The end of the stream means the transport dropped. Dropping the stream
/// cancels the underlying request.
pub type NotificationStream = BoxStream<'static, RawNotification>;

#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Blocking snapshot query. The returned snapshot is partial: it only
    /// carries what the query covers.
    async fn query(&self, query: Query) -> NodeResult<Snapshot>;

    /// Open a new subscription. Every call starts a fresh session.
    async fn subscribe(&self, topic: Topic) -> NodeResult<NotificationStream>;
}

/// Initial model: node info, channel list and wallet channel balance.
pub async fn seed_snapshot(client: &dyn NodeClient) -> NodeResult<Snapshot> {
    let mut snapshot = client.query(Query::NodeInfo).await?;
    snapshot.merge(client.query(Query::Channels).await?);
    snapshot.merge(client.query(Query::ChannelBalance).await?);
    Ok(snapshot)
}
