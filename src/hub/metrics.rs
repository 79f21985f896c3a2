use serde::Serialize;
/// Hub metrics
///
/// Counters are shared by all workers and read by the dashboard footer and
/// the pubsub shutdown summary.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Events handed to the output queue (data and health)
    events_published: AtomicU64,

    /// Notifications the normalizer discarded
    events_discarded: AtomicU64,

    /// Subscription attempts after the first one
    reconnects: AtomicU64,

    /// StreamDegraded events emitted
    degradations: AtomicU64,

    /// StreamRecovered events emitted
    recoveries: AtomicU64,
}

impl HubMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_discarded(&self) {
        self.events_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_degradations(&self) {
        self.degradations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_recoveries(&self) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HubMetricsSnapshot {
        HubMetricsSnapshot {
            events_published: self.events_published.load(Ordering::Relaxed),
            events_discarded: self.events_discarded.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            degradations: self.degradations.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubMetricsSnapshot {
    pub events_published: u64,
    pub events_discarded: u64,
    pub reconnects: u64,
    pub degradations: u64,
    pub recoveries: u64,
}
