// crates/jobs/src/wake.rs
//! Reference-counted keep-awake hold.
//!
//! Both trackers acquire against one shared counter; the platform hold is
//! released only when every acquisition has been released, never because
//! one tracker's set went empty while the other still has work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Platform hook that actually keeps the device awake.
pub trait WakeSink: Send + Sync {
    fn set_awake(&self, awake: bool);
}

/// Sink for tests and headless runs.
pub struct NoopWakeSink;

impl WakeSink for NoopWakeSink {
    fn set_awake(&self, _awake: bool) {}
}

pub struct WakeLock {
    count: AtomicUsize,
    sink: Arc<dyn WakeSink>,
}

impl WakeLock {
    pub fn new(sink: Arc<dyn WakeSink>) -> Self {
        Self {
            count: AtomicUsize::new(0),
            sink,
        }
    }

    pub fn acquire(&self) {
        if self.count.fetch_add(1, Ordering::SeqCst) == 0 {
            debug!("wake hold acquired");
            self.sink.set_awake(true);
        }
    }

    /// Releasing more times than acquired is a logic error upstream;
    /// the counter saturates at zero rather than wrapping.
    pub fn release(&self) {
        let prev = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
        match prev {
            Ok(1) => {
                debug!("wake hold released");
                self.sink.set_awake(false);
            }
            Ok(_) => {}
            Err(_) => tracing::warn!("wake lock released below zero"),
        }
    }

    pub fn holds(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    struct RecordingSink {
        awake: AtomicBool,
    }

    impl WakeSink for RecordingSink {
        fn set_awake(&self, awake: bool) {
            self.awake.store(awake, Ordering::SeqCst);
        }
    }

    #[test]
    fn hold_spans_overlapping_acquisitions() {
        let sink = Arc::new(RecordingSink {
            awake: AtomicBool::new(false),
        });
        let lock = WakeLock::new(sink.clone());

        lock.acquire(); // tracker one
        lock.acquire(); // tracker two
        assert!(sink.awake.load(Ordering::SeqCst));

        lock.release();
        // One holder remains; still awake.
        assert!(sink.awake.load(Ordering::SeqCst));

        lock.release();
        assert!(!sink.awake.load(Ordering::SeqCst));
        assert_eq!(lock.holds(), 0);
    }

    #[test]
    fn release_below_zero_is_harmless() {
        let lock = WakeLock::new(Arc::new(NoopWakeSink));
        lock.release();
        assert_eq!(lock.holds(), 0);
    }
}
