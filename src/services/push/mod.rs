pub mod webhook;

use async_trait::async_trait;

use crate::models::Notification;

/// Delivers a stored notification to something outside the process.
#[async_trait]
pub trait NotificationPusher: Send + Sync {
    async fn push(&self, notification: &Notification) -> anyhow::Result<()>;
}
