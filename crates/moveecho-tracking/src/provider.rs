//! Location sources
//!
//! The platform location service sits behind [`LocationProvider`]. Two
//! implementations ship here: [`SimulatedProvider`] walks a straight line at
//! a fixed speed, and [`ChannelProvider`] forwards samples pushed into it by
//! the host.

use crate::error::ProviderError;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use moveecho_core::{AccuracyMode, LocationSample, TrackingConfig};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stream of position fixes; ends when updates are withdrawn
pub type SampleStream = BoxStream<'static, LocationSample>;

/// Parameters of a location update request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    /// Target interval between samples
    pub interval: Duration,
    /// Samples never arrive faster than this
    pub fastest_interval: Duration,
    pub accuracy: AccuracyMode,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self::from_config(&TrackingConfig::default())
    }
}

impl LocationRequest {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            interval: config.interval(),
            fastest_interval: config.fastest_interval(),
            accuracy: config.accuracy,
        }
    }
}

/// Source of position fixes
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Starts updates. At most one subscription is active at a time.
    async fn subscribe(&self, request: LocationRequest) -> Result<SampleStream, ProviderError>;

    /// Withdraws updates; the stream returned by `subscribe` ends.
    async fn unsubscribe(&self) -> Result<(), ProviderError>;
}

const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy)]
struct Walk {
    start: (f64, f64),
    heading_degrees: f64,
    speed_mps: f64,
}

impl Walk {
    fn position_at(&self, steps: u64, interval: Duration) -> (f64, f64) {
        let distance = self.speed_mps * interval.as_secs_f64() * steps as f64;
        let heading = self.heading_degrees.to_radians();

        let lat = self.start.0 + distance * heading.cos() / METERS_PER_DEGREE;
        let lat = lat.clamp(-90.0, 90.0);

        let meters_per_degree_lng = METERS_PER_DEGREE * lat.to_radians().cos().max(1e-6);
        let lng = self.start.1 + distance * heading.sin() / meters_per_degree_lng;

        (lat, wrap_longitude(lng))
    }
}

fn wrap_longitude(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps +180 to -180
    if wrapped == -180.0 && lng > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Moves from a start point along a constant heading, one step per interval.
///
/// The first sample is the start point and is emitted immediately.
pub struct SimulatedProvider {
    walk: Walk,
    active: Mutex<Option<CancellationToken>>,
}

impl SimulatedProvider {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            walk: Walk {
                start: (latitude, longitude),
                heading_degrees: 45.0,
                speed_mps: 13.9,
            },
            active: Mutex::new(None),
        }
    }

    /// Compass heading in degrees, 0 = north
    pub fn with_heading(mut self, degrees: f64) -> Self {
        self.walk.heading_degrees = degrees;
        self
    }

    pub fn with_speed(mut self, meters_per_second: f64) -> Self {
        self.walk.speed_mps = meters_per_second;
        self
    }

    /// Position after `steps` intervals of `interval` each
    pub fn position_at(&self, steps: u64, interval: Duration) -> (f64, f64) {
        self.walk.position_at(steps, interval)
    }
}

#[async_trait]
impl LocationProvider for SimulatedProvider {
    async fn subscribe(&self, request: LocationRequest) -> Result<SampleStream, ProviderError> {
        let interval = request.interval.max(request.fastest_interval);
        if interval.is_zero() {
            return Err(ProviderError::Unavailable("zero update interval".to_string()));
        }

        let token = {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(ProviderError::AlreadySubscribed);
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };

        debug!(
            interval_ms = interval.as_millis() as u64,
            accuracy = ?request.accuracy,
            "Simulated location updates started"
        );

        let walk = self.walk;
        let stream = IntervalStream::new(tokio::time::interval(interval))
            .enumerate()
            .map(move |(step, _)| {
                let (lat, lng) = walk.position_at(step as u64, interval);
                LocationSample::now(lat, lng)
            })
            .take_until(token.cancelled_owned());

        Ok(stream.boxed())
    }

    async fn unsubscribe(&self) -> Result<(), ProviderError> {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
            debug!("Simulated location updates stopped");
        }
        Ok(())
    }
}

/// Forwards samples pushed by the host, e.g. fixes delivered by a platform
/// callback.
#[derive(Default)]
pub struct ChannelProvider {
    sender: Mutex<Option<mpsc::Sender<LocationSample>>>,
}

impl ChannelProvider {
    const CAPACITY: usize = 32;

    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a sample to the current subscriber. Returns false when no
    /// one is subscribed or the subscriber is not keeping up.
    pub fn push(&self, sample: LocationSample) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(sample).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().is_some()
    }
}

#[async_trait]
impl LocationProvider for ChannelProvider {
    async fn subscribe(&self, _request: LocationRequest) -> Result<SampleStream, ProviderError> {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return Err(ProviderError::AlreadySubscribed);
        }

        let (tx, rx) = mpsc::channel(Self::CAPACITY);
        *sender = Some(tx);
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn unsubscribe(&self) -> Result<(), ProviderError> {
        self.sender.lock().take();
        Ok(())
    }
}
