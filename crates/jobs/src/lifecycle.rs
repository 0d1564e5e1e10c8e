// crates/jobs/src/lifecycle.rs
//! App foreground/background signal.
//!
//! One observable value; the job tracker and the upload tracker subscribe
//! independently rather than being coupled to each other.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppLifecycle {
    #[default]
    Foreground,
    Background,
}

/// Latest-value bus for the lifecycle signal.
pub struct LifecycleBus {
    tx: watch::Sender<AppLifecycle>,
}

impl LifecycleBus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AppLifecycle::Foreground);
        Self { tx }
    }

    /// Publish a transition. Setting the current value again is a no-op
    /// for subscribers.
    pub fn set(&self, state: AppLifecycle) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<AppLifecycle> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> AppLifecycle {
        *self.tx.borrow()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new()
    }
}
