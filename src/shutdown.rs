use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

// ═══════════════════════════════════════════════════════════════════════════════
// SHUTDOWN SIGNAL
// ═══════════════════════════════════════════════════════════════════════════════
//
// A `Shutdown` is a cancellation handle passed explicitly to every long-lived
// task. Triggering is sticky: once set, the flag never clears and every
// present or future `wait()` returns.
//
// `child()` derives a handle that fires when either it or any ancestor fires.
// The hub gives workers a child of the caller's handle so `Hub::stop` can
// cancel its workers without cancelling the caller.
// ═══════════════════════════════════════════════════════════════════════════════

struct ShutdownInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl ShutdownInner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            triggered: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }
}

#[derive(Clone)]
pub struct Shutdown {
    /// This handle first, then its ancestors
    chain: Vec<Arc<ShutdownInner>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            chain: vec![ShutdownInner::new()],
        }
    }

    pub fn child(&self) -> Self {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.push(ShutdownInner::new());
        chain.extend(self.chain.iter().cloned());
        Self { chain }
    }

    /// Fire this handle (and therefore all of its children). Idempotent.
    pub fn trigger(&self) {
        let own = &self.chain[0];
        if !own.triggered.swap(true, Ordering::SeqCst) {
            own.notify.notify_waiters();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.chain
            .iter()
            .any(|inner| inner.triggered.load(Ordering::SeqCst))
    }

    /// Resolves once this handle or an ancestor has been triggered.
    pub async fn wait(&self) {
        loop {
            // Register interest before checking the flags so a trigger that
            // lands in between is not lost.
            let mut waiters: Vec<_> = self
                .chain
                .iter()
                .map(|inner| Box::pin(inner.notify.notified()))
                .collect();
            for waiter in waiters.iter_mut() {
                waiter.as_mut().enable();
            }

            if self.is_triggered() {
                return;
            }

            futures::future::select_all(waiters).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("depth", &self.chain.len())
            .field("triggered", &self.is_triggered())
            .finish()
    }
}
