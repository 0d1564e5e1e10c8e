// crates/jobs/src/lib.rs
//! Background job orchestration.
//!
//! Provides:
//! - [`JobTracker`] - polls in-flight analyses to a terminal state,
//!   surviving app suspension via a durable job map
//! - [`BackgroundUploadTracker`] - retries pending uploads and hands off
//!   to the job tracker on success
//! - [`LifecycleBus`] - the shared foreground/background signal
//! - [`WakeLock`] - the reference-counted keep-awake hold both trackers
//!   share
//! - [`NotificationScheduler`] - the consumed notification interface

pub mod lifecycle;
pub mod notify;
pub mod record;
pub mod tracker;
pub mod upload;
pub mod wake;

pub use lifecycle::{AppLifecycle, LifecycleBus};
pub use notify::{Notification, NotificationScheduler, TracingNotifier};
pub use record::{JobRecord, UploadRecord};
pub use tracker::{JobOutcome, JobTracker, JobTrackerConfig};
pub use upload::BackgroundUploadTracker;
pub use wake::{NoopWakeSink, WakeLock, WakeSink};
