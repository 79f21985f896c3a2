/// Per-topic subscription bookkeeping
///
/// Workers own their state machine; this table mirrors it read-only for
/// diagnostics and for `Hub::is_exhausted`.
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::events::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Connecting,
    Streaming,
    Backoff,
    /// Retry cap exceeded; the topic is degraded
    Failed,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::Streaming => "streaming",
            SubscriptionState::Backoff => "backoff",
            SubscriptionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub topic: Topic,
    pub retry_count: u32,
    pub state: SubscriptionState,
}

#[derive(Clone, Default)]
pub struct SubscriptionTable {
    entries: Arc<RwLock<BTreeMap<Topic, Subscription>>>,
}

impl SubscriptionTable {
    pub fn new(topics: &[Topic]) -> Self {
        let entries = topics
            .iter()
            .map(|topic| {
                (
                    *topic,
                    Subscription {
                        topic: *topic,
                        retry_count: 0,
                        state: SubscriptionState::Connecting,
                    },
                )
            })
            .collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn update(&self, topic: Topic, state: SubscriptionState, retry_count: u32) {
        let mut entries = self.entries.write();
        let entry = entries.entry(topic).or_insert(Subscription {
            topic,
            retry_count,
            state,
        });
        entry.state = state;
        entry.retry_count = retry_count;
    }

    pub fn get(&self, topic: Topic) -> Option<Subscription> {
        self.entries.read().get(&topic).cloned()
    }

    pub fn all(&self) -> Vec<Subscription> {
        self.entries.read().values().cloned().collect()
    }

    /// True when there is at least one topic and every topic has failed.
    pub fn all_failed(&self) -> bool {
        let entries = self.entries.read();
        !entries.is_empty()
            && entries
                .values()
                .all(|s| s.state == SubscriptionState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_failed() {
        let table = SubscriptionTable::new(&[Topic::Invoices, Topic::Htlcs]);
        assert!(!table.all_failed());

        table.update(Topic::Invoices, SubscriptionState::Failed, 4);
        assert!(!table.all_failed());
        table.update(Topic::Htlcs, SubscriptionState::Failed, 4);
        assert!(table.all_failed());

        assert_eq!(table.get(Topic::Htlcs).unwrap().retry_count, 4);
        assert!(!SubscriptionTable::default().all_failed());
    }
}
