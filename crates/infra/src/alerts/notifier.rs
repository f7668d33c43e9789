use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use stockwise_core::{TenantId, UserId};
use stockwise_inventory::{AlertChannel, AlertPriority};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub tenant_id: TenantId,
    pub title: String,
    pub body: String,
    pub priority: AlertPriority,
    pub recipient_ids: Vec<UserId>,
    pub channels: Vec<AlertChannel>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound delivery of alert notifications. Delivery is best-effort; callers
/// log failures and carry on.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Default when no delivery channel is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            tenant_id = %notification.tenant_id,
            priority = notification.priority.as_str(),
            recipients = notification.recipient_ids.len(),
            title = %notification.title,
            body = %notification.body,
            "inventory notification"
        );
        Ok(())
    }
}

/// Collects notifications for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Reject every following delivery.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("channel unavailable".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| NotifyError::Delivery("lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
