/// Bounded output queue shared by all hub workers
///
/// One FIFO carries both data and health events, so per-topic order holds
/// across the two. The channel has `capacity + reserved` slots; data events
/// must first take one of `capacity` permits, which travels with the event
/// and is released when the consumer dequeues it. Health events skip the
/// permits, so they always find one of the reserved slots free while data is
/// backed up.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore};

use crate::events::Event;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The shutdown signal fired while waiting for room
    Cancelled,
    /// The queue has been closed by `Hub::stop`
    Closed,
}

struct Queued {
    event: Event,
    _permit: Option<OwnedSemaphorePermit>,
}

struct QueueShared {
    closed: AtomicBool,
    closed_notify: Notify,
    permits: Arc<Semaphore>,
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Queued>,
    shared: Arc<QueueShared>,
}

pub struct EventReceiver {
    rx: mpsc::Receiver<Queued>,
    shared: Arc<QueueShared>,
}

/// Create a queue with `capacity` data slots plus `reserved` health slots.
pub fn event_queue(capacity: usize, reserved: usize) -> (EventSender, EventReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity + reserved);
    let shared = Arc::new(QueueShared {
        closed: AtomicBool::new(false),
        closed_notify: Notify::new(),
        permits: Arc::new(Semaphore::new(capacity)),
    });
    (
        EventSender {
            tx,
            shared: shared.clone(),
        },
        EventReceiver { rx, shared },
    )
}

impl EventSender {
    /// Enqueue an event, waiting for room. Health events are routed to
    /// `publish_signal`.
    pub async fn publish(&self, event: Event, shutdown: &Shutdown) -> Result<(), PublishError> {
        if event.kind.is_health_signal() {
            return self.publish_signal(event, shutdown).await;
        }
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        let permit = tokio::select! {
            biased;
            _ = shutdown.wait() => return Err(PublishError::Cancelled),
            permit = self.shared.permits.clone().acquire_owned() => {
                permit.map_err(|_| PublishError::Closed)?
            }
        };

        self.send(
            Queued {
                event,
                _permit: Some(permit),
            },
            shutdown,
        )
        .await
    }

    /// Enqueue a health event without taking a data permit.
    pub async fn publish_signal(
        &self,
        event: Event,
        shutdown: &Shutdown,
    ) -> Result<(), PublishError> {
        self.send(
            Queued {
                event,
                _permit: None,
            },
            shutdown,
        )
        .await
    }

    async fn send(&self, item: Queued, shutdown: &Shutdown) -> Result<(), PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }
        tokio::select! {
            biased;
            _ = shutdown.wait() => Err(PublishError::Cancelled),
            sent = self.tx.send(item) => sent.map_err(|_| PublishError::Closed),
        }
    }

    /// Close the queue for everyone. Buffered events are discarded and the
    /// receiver yields `None` from now on.
    pub fn close(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared.permits.close();
            self.shared.closed_notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl EventReceiver {
    /// Next event, or `None` once the queue is closed or every sender is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        let closed = self.shared.closed_notify.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        if self.shared.closed.load(Ordering::SeqCst) {
            return None;
        }

        tokio::select! {
            biased;
            _ = &mut closed => None,
            item = self.rx.recv() => {
                if self.shared.closed.load(Ordering::SeqCst) {
                    return None;
                }
                item.map(|queued| queued.event)
            }
        }
    }

    /// Non-blocking variant of `recv`.
    pub fn try_recv(&mut self) -> Option<Event> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return None;
        }
        self.rx.try_recv().ok().map(|queued| queued.event)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}
