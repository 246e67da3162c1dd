//! Busy/idle signal observed by progress indicators.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

/// Reference-counted busy flag.
///
/// Every outstanding `LoadingGuard` keeps the signal busy; it flips back to idle
/// when the last guard drops. Observers only see edges, never nested begins.
#[derive(Debug)]
pub struct LoadingSignal {
    active: Mutex<usize>,
    tx: watch::Sender<bool>,
}

impl LoadingSignal {
    pub fn new() -> Arc<Self> {
        let (tx, _) = watch::channel(false);
        Arc::new(Self {
            active: Mutex::new(0),
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        *self.tx.borrow()
    }

    /// Number of guards currently held.
    pub fn active(&self) -> usize {
        *self.active.lock()
    }

    pub fn begin(self: &Arc<Self>) -> LoadingGuard {
        let mut active = self.active.lock();
        *active += 1;
        if *active == 1 {
            trace!("loading.busy");
            self.tx.send_replace(true);
        }
        LoadingGuard {
            signal: Arc::clone(self),
        }
    }

    fn end(&self) {
        let mut active = self.active.lock();
        *active = active.saturating_sub(1);
        if *active == 0 {
            trace!("loading.idle");
            self.tx.send_replace(false);
        }
    }
}

/// Keeps the signal busy until dropped.
#[derive(Debug)]
pub struct LoadingGuard {
    signal: Arc<LoadingSignal>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.signal.end();
    }
}
