// crates/jobs/src/notify.rs
//! Consumed local-notification interface. Fire-and-forget: the core never
//! waits on an acknowledgment.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn schedule(&self, notification: Notification);
}

/// Scheduler that only logs; the default when no platform service is
/// wired in.
pub struct TracingNotifier;

#[async_trait]
impl NotificationScheduler for TracingNotifier {
    async fn schedule(&self, notification: Notification) {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            "notification scheduled"
        );
    }
}
