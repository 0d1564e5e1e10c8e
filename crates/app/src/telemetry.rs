// crates/app/src/telemetry.rs
//! Tracing setup for embedders that do not bring their own subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` controls verbosity; absent,
/// everything at `info` and above is emitted. Calling twice is a no-op so
/// hosts that already installed a subscriber are left alone.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
