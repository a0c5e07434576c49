use moveecho_core::ReconnectConfig;
use std::time::Duration;

/// Health status of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Connected and recently active
    Healthy,
    /// Operational but idle, or in the middle of (re)connecting
    Degraded,
    /// Retry budget exhausted
    Unhealthy,
    /// Not connected and not trying to
    Disconnected,
}

/// Result of a health check
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Current health status
    pub status: HealthStatus,
    /// Last recorded error, if any
    pub message: Option<String>,
    /// Time since the last message in either direction
    pub idle: Option<Duration>,
}

/// Receiver of every message that arrives on a subscribed topic.
///
/// A manager holds exactly one handler. It runs on the manager's driver task,
/// so implementations should return quickly.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, topic: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &[u8]) + Send + Sync,
{
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self(topic, payload)
    }
}

/// Delay before the retry that follows `attempt` consecutive failures
/// (zero-based). With a multiplier of 1.0 this is the fixed base delay.
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let multiplier = config.backoff_multiplier.max(1.0);
    let backoff_secs = config.delay().as_secs_f64() * multiplier.powi(attempt as i32);
    let cap_secs = config.max_delay().max(config.delay()).as_secs_f64();
    let capped_secs = backoff_secs.min(cap_secs);
    Duration::from_secs_f64(capped_secs)
}
