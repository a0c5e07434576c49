//! Metrics Collection
//!
//! Counters for the inbound router and the outbound publisher. Values are
//! kept locally for snapshots and mirrored into the global `metrics`
//! recorder; installing an exporter is left to the host application.

use metrics::{counter, describe_counter};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

static DESCRIBE: Once = Once::new();

fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!(
            "moveecho_router_delivered_total",
            "Peer location messages delivered to observers"
        );
        describe_counter!(
            "moveecho_router_self_echo_total",
            "Own messages echoed back by the broker and dropped"
        );
        describe_counter!(
            "moveecho_router_malformed_total",
            "Inbound payloads that failed to decode"
        );
        describe_counter!(
            "moveecho_router_observer_failures_total",
            "Observer calls that returned an error or panicked"
        );
        describe_counter!(
            "moveecho_samples_published_total",
            "Location samples handed to the broker"
        );
        describe_counter!(
            "moveecho_samples_dropped_total",
            "Location samples dropped because publishing failed"
        );
    });
}

/// Router counters
#[derive(Debug)]
pub struct RouterMetrics {
    delivered: AtomicU64,
    self_echo: AtomicU64,
    malformed: AtomicU64,
    observer_failures: AtomicU64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        describe_metrics();

        Self {
            delivered: AtomicU64::new(0),
            self_echo: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            observer_failures: AtomicU64::new(0),
        }
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_router_delivered_total").increment(1);
    }

    pub fn record_self_echo(&self) {
        self.self_echo.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_router_self_echo_total").increment(1);
    }

    pub fn record_malformed(&self, kind: &'static str) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_router_malformed_total", "kind" => kind).increment(1);
    }

    pub fn record_observer_failure(&self) {
        self.observer_failures.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_router_observer_failures_total").increment(1);
    }

    pub fn snapshot(&self) -> RouterStats {
        RouterStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            self_echo_dropped: self.self_echo.load(Ordering::Relaxed),
            malformed_dropped: self.malformed.load(Ordering::Relaxed),
            observer_failures: self.observer_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time router counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    /// Messages that reached the observer pass (counted once per message)
    pub delivered: u64,
    pub self_echo_dropped: u64,
    pub malformed_dropped: u64,
    pub observer_failures: u64,
}

/// Publisher counters
#[derive(Debug)]
pub struct PublisherMetrics {
    published: AtomicU64,
    dropped: AtomicU64,
}

impl PublisherMetrics {
    pub fn new() -> Self {
        describe_metrics();

        Self {
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_samples_published_total").increment(1);
    }

    pub fn record_dropped(&self, reason: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_samples_dropped_total", "reason" => reason).increment(1);
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for PublisherMetrics {
    fn default() -> Self {
        Self::new()
    }
}
