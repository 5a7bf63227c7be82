//! Notifier trait for publishing status changes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

/// A notification to be sent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: i8,
    pub sound: Option<String>,
    /// Link to the public status page
    pub url: Option<String>,
}

/// Record of a notification attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub decision: Decision,
    pub notifier_type: String,
    pub message: String,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp_epoch_ms: u64,
}

/// Trait for sending notifications
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "pushover")
    fn type_name(&self) -> &str;

    /// Send a notification
    async fn notify(&self, notification: &Notification) -> crate::Result<()>;
}
