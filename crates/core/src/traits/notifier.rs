//! Notification sink

use async_trait::async_trait;

use crate::error::Result;
use crate::escalation::NotificationEvent;

/// Receives escalation and agent events. Delivery is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;

    fn name(&self) -> &str {
        "notifier"
    }
}
