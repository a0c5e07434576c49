//! Foreground host
//!
//! On mobile platforms continuous tracking needs a user-visible foreground
//! service. The session enters the host on start and leaves it on stop.

use crate::error::HostError;
use parking_lot::Mutex;
use tracing::info;

/// What the host shows while tracking is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSpec {
    pub id: u32,
    pub channel_id: String,
    pub channel_name: String,
    pub channel_description: String,
    pub title: String,
    pub text: String,
}

impl Default for NotificationSpec {
    fn default() -> Self {
        Self {
            id: 1001,
            channel_id: "MoveEchoLocationChannel".to_string(),
            channel_name: "Location Tracking".to_string(),
            channel_description: "Shows when MoveEcho is tracking your location".to_string(),
            title: "MoveEcho Active".to_string(),
            text: "Sharing your location in real-time".to_string(),
        }
    }
}

pub trait ForegroundHost: Send + Sync {
    fn enter_foreground(&self, notification: &NotificationSpec) -> Result<(), HostError>;

    fn exit_foreground(&self);
}

/// Host for desktop and server use: logs the transitions
#[derive(Debug, Default)]
pub struct LoggingHost {
    active: Mutex<Option<u32>>,
}

impl LoggingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_foreground(&self) -> bool {
        self.active.lock().is_some()
    }
}

impl ForegroundHost for LoggingHost {
    fn enter_foreground(&self, notification: &NotificationSpec) -> Result<(), HostError> {
        *self.active.lock() = Some(notification.id);
        info!(
            notification_id = notification.id,
            title = %notification.title,
            "{}",
            notification.text
        );
        Ok(())
    }

    fn exit_foreground(&self) {
        if let Some(id) = self.active.lock().take() {
            info!(notification_id = id, "Left foreground");
        }
    }
}
