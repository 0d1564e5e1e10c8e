// crates/app/src/lib.rs
//! Application composition root.
//!
//! Embedders call [`CoreServices::init`] once at startup and use the
//! returned facade for everything: session persistence, analysis jobs,
//! background uploads, sync, and analytics.

pub mod config;
pub mod services;
pub mod telemetry;

pub use config::CoreConfig;
pub use services::{CoreServices, AUTH_TOKEN_KEY};
