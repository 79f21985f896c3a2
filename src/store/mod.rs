//! Model store
//!
//! Holds the current `Snapshot` and applies normalized events to it. Readers
//! get an `Arc<Snapshot>` that never changes under them; every applied event
//! publishes a new one.

mod snapshot;

pub use snapshot::{Activity, Channel, ChannelBalance, ChannelId, NodeInfo, Snapshot, Totals};

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::errors::StoreError;
use crate::events::{Event, EventKind, InvoiceState, Topic};
use crate::logger::{LogTag, Logger};

/// Outcome of `ModelStore::apply`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The snapshot changed
    Updated,
    /// Redelivered sequence or an older update counter; nothing changed
    Stale,
    /// The event has no effect on the model (e.g. closing an unknown channel)
    Ignored,
}

struct StoreState {
    snapshot: Option<Arc<Snapshot>>,
    high_water: HashMap<Topic, u64>,
    /// Channels seen closing. Channel points are never reused, so any later
    /// update for one of these was produced before the close.
    closed: HashSet<ChannelId>,
}

pub struct ModelStore {
    state: RwLock<StoreState>,
    logger: Logger,
}

impl ModelStore {
    pub fn new(logger: Logger) -> Self {
        Self {
            state: RwLock::new(StoreState {
                snapshot: None,
                high_water: HashMap::new(),
                closed: HashSet::new(),
            }),
            logger,
        }
    }

    /// Install the initial snapshot. Allowed exactly once.
    pub fn seed(&self, mut snapshot: Snapshot) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.snapshot.is_some() {
            return Err(StoreError::AlreadySeeded);
        }
        snapshot.recompute_totals();
        self.logger.info(
            LogTag::Store,
            &format!("Seeded with {} channels", snapshot.channels.len()),
        );
        state.snapshot = Some(Arc::new(snapshot));
        Ok(())
    }

    pub fn is_seeded(&self) -> bool {
        self.state.read().snapshot.is_some()
    }

    /// Current view. Empty until seeded.
    pub fn current(&self) -> Arc<Snapshot> {
        self.state
            .read()
            .snapshot
            .clone()
            .unwrap_or_else(|| Arc::new(Snapshot::default()))
    }

    pub fn apply(&self, event: &Event) -> Result<Applied, StoreError> {
        let mut state = self.state.write();
        let current = state.snapshot.clone().ok_or(StoreError::NotSeeded)?;

        let high_water = state.high_water.entry(event.topic).or_insert(0);
        if event.sequence <= *high_water {
            self.logger.debug(
                LogTag::Store,
                &format!(
                    "Redelivered {} #{} (high-water {})",
                    event.topic, event.sequence, high_water
                ),
            );
            return Ok(Applied::Stale);
        }
        *high_water = event.sequence;

        let mut next = (*current).clone();
        let outcome = apply_kind(&mut next, &mut state.closed, event.topic, &event.kind);

        match outcome {
            Applied::Updated => {
                next.recompute_totals();
                state.snapshot = Some(Arc::new(next));
            }
            Applied::Stale | Applied::Ignored => {
                self.logger.debug(
                    LogTag::Store,
                    &format!("{:?}: {}", outcome, event.summary()),
                );
            }
        }
        Ok(outcome)
    }
}

fn apply_kind(
    snapshot: &mut Snapshot,
    closed: &mut HashSet<ChannelId>,
    topic: Topic,
    kind: &EventKind,
) -> Applied {
    match kind {
        EventKind::ChannelOpened(channel) => {
            if closed.contains(&channel.id) {
                return Applied::Stale;
            }
            if let Some(existing) = snapshot.channels.get(&channel.id) {
                if existing.update_counter > channel.update_counter {
                    return Applied::Stale;
                }
            }
            snapshot.channels.insert(channel.id.clone(), channel.clone());
            Applied::Updated
        }

        EventKind::ChannelClosed { channel_id } => {
            closed.insert(channel_id.clone());
            match snapshot.channels.remove(channel_id) {
                Some(_) => Applied::Updated,
                None => Applied::Ignored,
            }
        }

        EventKind::ChannelActiveChanged { channel_id, active } => {
            if closed.contains(channel_id) {
                return Applied::Stale;
            }
            let channel = snapshot
                .channels
                .entry(channel_id.clone())
                .or_insert_with(|| Channel::unknown(channel_id.clone()));
            channel.active = *active;
            Applied::Updated
        }

        EventKind::BalanceUpdated(polled) => {
            if closed.contains(&polled.id) {
                return Applied::Stale;
            }
            match snapshot.channels.get_mut(&polled.id) {
                // First sighting: the poll carries the full channel
                None => {
                    snapshot.channels.insert(polled.id.clone(), polled.clone());
                    Applied::Updated
                }
                Some(existing) if existing.update_counter > polled.update_counter => {
                    Applied::Stale
                }
                Some(existing) if *existing == *polled => Applied::Ignored,
                Some(existing) => {
                    *existing = polled.clone();
                    Applied::Updated
                }
            }
        }

        EventKind::HtlcSettled { .. } => {
            snapshot.activity.htlcs_settled += 1;
            Applied::Updated
        }

        EventKind::InvoiceUpdated { state, .. } => {
            if *state == InvoiceState::Settled {
                snapshot.activity.invoices_settled += 1;
                Applied::Updated
            } else {
                Applied::Ignored
            }
        }

        EventKind::TransactionSeen { block_height, .. } => {
            snapshot.activity.transactions_seen += 1;
            snapshot.activity.last_block_height =
                snapshot.activity.last_block_height.max(*block_height);
            Applied::Updated
        }

        EventKind::StreamDegraded { .. } => {
            if snapshot.degraded_topics.insert(topic) {
                Applied::Updated
            } else {
                Applied::Ignored
            }
        }

        EventKind::StreamRecovered => {
            if snapshot.degraded_topics.remove(&topic) {
                Applied::Updated
            } else {
                Applied::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(point: &str, capacity: i64, local: i64, counter: u64) -> Channel {
        Channel {
            capacity,
            local_balance: local,
            remote_balance: capacity - local,
            active: true,
            update_counter: counter,
            ..Channel::unknown(ChannelId::parse(point).unwrap())
        }
    }

    fn event(topic: Topic, sequence: u64, kind: EventKind) -> Event {
        Event {
            topic,
            sequence,
            kind,
        }
    }

    fn seeded(channels: Vec<Channel>) -> ModelStore {
        let store = ModelStore::new(Logger::silent());
        store.seed(Snapshot::with_channels(channels)).unwrap();
        store
    }

    #[test]
    fn test_seed_once() {
        let store = ModelStore::new(Logger::silent());
        assert!(!store.is_seeded());
        store.seed(Snapshot::default()).unwrap();
        assert_eq!(
            store.seed(Snapshot::default()),
            Err(StoreError::AlreadySeeded)
        );
    }

    #[test]
    fn test_apply_before_seed() {
        let store = ModelStore::new(Logger::silent());
        let result = store.apply(&event(Topic::Htlcs, 1, EventKind::StreamRecovered));
        assert_eq!(result, Err(StoreError::NotSeeded));
    }

    #[test]
    fn test_seed_then_open_gives_three_channels() {
        let store = seeded(vec![channel("aa:0", 100, 100, 1), channel("bb:0", 200, 200, 1)]);
        let applied = store
            .apply(&event(
                Topic::ChannelState,
                1,
                EventKind::ChannelOpened(channel("cc:1", 50, 50, 0)),
            ))
            .unwrap();
        assert_eq!(applied, Applied::Updated);

        let snapshot = store.current();
        assert_eq!(snapshot.channels.len(), 3);
        assert_eq!(
            snapshot.channel(&ChannelId::new("aa", 0)).unwrap().local_balance,
            100
        );
        assert_eq!(
            snapshot.channel(&ChannelId::new("bb", 0)).unwrap().local_balance,
            200
        );
        assert_eq!(
            snapshot.channel(&ChannelId::new("cc", 1)).unwrap().local_balance,
            50
        );
        assert_eq!(snapshot.totals.local_balance, 350);
    }

    #[test]
    fn test_apply_is_idempotent_per_sequence() {
        let store = seeded(vec![channel("aa:0", 100, 50, 1)]);
        let balance = event(
            Topic::ChannelBalances,
            4,
            EventKind::BalanceUpdated(channel("aa:0", 100, 60, 2)),
        );

        assert_eq!(store.apply(&balance).unwrap(), Applied::Updated);
        let first = store.current();
        assert_eq!(store.apply(&balance).unwrap(), Applied::Stale);
        let second = store.current();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.totals.local_balance, 60);
    }

    #[test]
    fn test_stale_update_counter_is_noop() {
        let store = seeded(vec![channel("aa:0", 100, 50, 9)]);
        let before = store.current();

        let applied = store
            .apply(&event(
                Topic::ChannelBalances,
                1,
                EventKind::BalanceUpdated(channel("aa:0", 100, 10, 8)),
            ))
            .unwrap();

        assert_eq!(applied, Applied::Stale);
        assert_eq!(*store.current(), *before);
    }

    #[test]
    fn test_update_creates_unknown_channel() {
        let store = seeded(vec![]);
        store
            .apply(&event(
                Topic::ChannelState,
                1,
                EventKind::ChannelActiveChanged {
                    channel_id: ChannelId::new("dd", 2),
                    active: true,
                },
            ))
            .unwrap();

        let snapshot = store.current();
        let created = snapshot.channel(&ChannelId::new("dd", 2)).unwrap();
        assert!(created.active);
        assert_eq!(snapshot.totals.active, 1);
    }

    #[test]
    fn test_balance_poll_fills_in_unknown_channel() {
        let store = seeded(vec![]);
        let mut polled = channel("bb:1", 500_000, 200_000, 3);
        polled.remote_party = "03bob".to_string();
        polled.short_channel_id = 876_543;

        let applied = store
            .apply(&event(
                Topic::ChannelBalances,
                1,
                EventKind::BalanceUpdated(polled.clone()),
            ))
            .unwrap();
        assert_eq!(applied, Applied::Updated);

        let snapshot = store.current();
        assert_eq!(snapshot.channel(&polled.id), Some(&polled));
        assert_eq!(snapshot.totals.capacity, 500_000);
        assert_eq!(snapshot.totals.local_balance, 200_000);
        assert_eq!(snapshot.totals.active, 1);
    }

    #[test]
    fn test_unchanged_balance_poll_is_ignored() {
        let store = seeded(vec![channel("aa:0", 100, 50, 4)]);
        let before = store.current();

        let applied = store
            .apply(&event(
                Topic::ChannelBalances,
                1,
                EventKind::BalanceUpdated(channel("aa:0", 100, 50, 4)),
            ))
            .unwrap();
        assert_eq!(applied, Applied::Ignored);
        assert!(Arc::ptr_eq(&before, &store.current()));

        // Same counter, but the node now reports the channel inactive
        let mut inactive = channel("aa:0", 100, 50, 4);
        inactive.active = false;
        let applied = store
            .apply(&event(
                Topic::ChannelBalances,
                2,
                EventKind::BalanceUpdated(inactive),
            ))
            .unwrap();
        assert_eq!(applied, Applied::Updated);
        assert_eq!(store.current().totals.inactive, 1);
    }

    #[test]
    fn test_late_updates_do_not_resurrect_closed_channel() {
        let store = seeded(vec![channel("aa:0", 1_000, 500, 4)]);
        let closed = store
            .apply(&event(
                Topic::ChannelState,
                1,
                EventKind::ChannelClosed {
                    channel_id: ChannelId::new("aa", 0),
                },
            ))
            .unwrap();
        assert_eq!(closed, Applied::Updated);

        // Polled before the close, delivered after it
        let late_poll = store
            .apply(&event(
                Topic::ChannelBalances,
                1,
                EventKind::BalanceUpdated(channel("aa:0", 1_000, 400, 5)),
            ))
            .unwrap();
        assert_eq!(late_poll, Applied::Stale);

        let late_active = store
            .apply(&event(
                Topic::ChannelState,
                2,
                EventKind::ChannelActiveChanged {
                    channel_id: ChannelId::new("aa", 0),
                    active: true,
                },
            ))
            .unwrap();
        assert_eq!(late_active, Applied::Stale);

        let snapshot = store.current();
        assert!(snapshot.channels.is_empty());
        assert_eq!(snapshot.totals, Totals::default());
    }

    #[test]
    fn test_graph_close_before_open_keeps_channel_closed() {
        let store = seeded(vec![]);
        store
            .apply(&event(
                Topic::ChannelGraph,
                1,
                EventKind::ChannelClosed {
                    channel_id: ChannelId::new("cc", 0),
                },
            ))
            .unwrap();
        let applied = store
            .apply(&event(
                Topic::ChannelState,
                1,
                EventKind::ChannelOpened(channel("cc:0", 100, 100, 0)),
            ))
            .unwrap();
        assert_eq!(applied, Applied::Stale);
        assert!(store.current().channels.is_empty());
    }

    #[test]
    fn test_close_unknown_channel_is_ignored() {
        let store = seeded(vec![channel("aa:0", 100, 50, 1)]);
        let applied = store
            .apply(&event(
                Topic::ChannelGraph,
                1,
                EventKind::ChannelClosed {
                    channel_id: ChannelId::new("zz", 0),
                },
            ))
            .unwrap();
        assert_eq!(applied, Applied::Ignored);

        let applied = store
            .apply(&event(
                Topic::ChannelState,
                1,
                EventKind::ChannelClosed {
                    channel_id: ChannelId::new("aa", 0),
                },
            ))
            .unwrap();
        assert_eq!(applied, Applied::Updated);
        assert!(store.current().channels.is_empty());
    }

    #[test]
    fn test_sequences_are_tracked_per_topic() {
        let store = seeded(vec![]);
        let htlc = EventKind::HtlcSettled {
            incoming_channel: 1,
            outgoing_channel: 2,
            timestamp_ns: 0,
        };
        assert_eq!(
            store.apply(&event(Topic::Htlcs, 5, htlc.clone())).unwrap(),
            Applied::Updated
        );
        assert_eq!(
            store
                .apply(&event(
                    Topic::Transactions,
                    1,
                    EventKind::TransactionSeen {
                        tx_hash: "ff".to_string(),
                        amount_sat: 1_000,
                        confirmations: 1,
                        block_height: 800_000,
                    }
                ))
                .unwrap(),
            Applied::Updated
        );
        assert_eq!(
            store.apply(&event(Topic::Htlcs, 5, htlc)).unwrap(),
            Applied::Stale
        );

        let activity = store.current().activity;
        assert_eq!(activity.htlcs_settled, 1);
        assert_eq!(activity.transactions_seen, 1);
        assert_eq!(activity.last_block_height, 800_000);
    }

    #[test]
    fn test_degraded_topics() {
        let store = seeded(vec![]);
        store
            .apply(&event(
                Topic::Invoices,
                1,
                EventKind::StreamDegraded {
                    retries: 4,
                    reason: "stream ended".to_string(),
                },
            ))
            .unwrap();
        assert!(store.current().degraded_topics.contains(&Topic::Invoices));

        store
            .apply(&event(Topic::Invoices, 2, EventKind::StreamRecovered))
            .unwrap();
        assert!(store.current().degraded_topics.is_empty());
    }

    #[test]
    fn test_open_invoice_is_ignored() {
        let store = seeded(vec![]);
        let applied = store
            .apply(&event(
                Topic::Invoices,
                1,
                EventKind::InvoiceUpdated {
                    payment_hash: "00".repeat(32),
                    value_sat: 1_000,
                    amount_paid_sat: 0,
                    state: InvoiceState::Open,
                },
            ))
            .unwrap();
        assert_eq!(applied, Applied::Ignored);
        assert_eq!(store.current().activity.invoices_settled, 0);
    }
}
