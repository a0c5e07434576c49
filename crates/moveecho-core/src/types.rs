//! Core types for the MoveEcho location-sharing client.
//!
//! This module defines the fundamental types shared by every crate in the
//! workspace: the per-process client identity, location samples, transport
//! tags, delivery guarantees and the broker connection settings.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Namespace prefix used when generating client identities.
pub const DEFAULT_CLIENT_ID_PREFIX: &str = "MoveEcho";

/// Shared topic every instance publishes to and subscribes on.
pub const DEFAULT_LOCATION_TOPIC: &str = "moveecho/locations";

/// Identity of one running MoveEcho instance.
///
/// Generated once when a connection manager is constructed and never changed
/// afterwards. Outgoing messages carry it, and the router uses it to discard
/// echoes of our own publications.
///
/// # Examples
///
/// ```
/// use moveecho_core::types::ClientId;
///
/// let id = ClientId::generate("MoveEcho");
/// assert!(id.as_str().starts_with("MoveEcho-"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a new identity of the form `<prefix>-<uuid v4>`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Uuid::new_v4()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single position fix produced by the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl LocationSample {
    /// Creates a sample with an explicit timestamp.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Creates a sample stamped with the current wall-clock time.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, Utc::now().timestamp_millis())
    }
}

/// Mode of movement attached to every published sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportTag {
    #[default]
    Car,
    Bike,
    Truck,
    Motorcycle,
    Walking,
}

impl TransportTag {
    /// Every tag, in display order.
    pub const ALL: [TransportTag; 5] = [
        TransportTag::Car,
        TransportTag::Bike,
        TransportTag::Truck,
        TransportTag::Motorcycle,
        TransportTag::Walking,
    ];

    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportTag::Car => "car",
            TransportTag::Bike => "bike",
            TransportTag::Truck => "truck",
            TransportTag::Motorcycle => "motorcycle",
            TransportTag::Walking => "walking",
        }
    }

    /// Resolves a stored preference value, falling back to `car` when the
    /// value is missing or unrecognized.
    pub fn from_preference(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for TransportTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(TransportTag::Car),
            "bike" => Ok(TransportTag::Bike),
            "truck" => Ok(TransportTag::Truck),
            "motorcycle" => Ok(TransportTag::Motorcycle),
            "walking" => Ok(TransportTag::Walking),
            other => Err(format!("unknown transport type: {}", other)),
        }
    }
}

/// Delivery guarantee for a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// Fire and forget
    #[default]
    AtMostOnce,
    /// Acknowledged delivery, duplicates possible
    AtLeastOnce,
    /// Four-way handshake delivery
    ExactlyOnce,
}

impl QoS {
    /// Numeric MQTT level.
    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Accuracy requested from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyMode {
    #[default]
    HighAccuracy,
    Balanced,
    LowPower,
    Passive,
}

/// URI scheme accepted for the broker address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerScheme {
    Tcp,
    Mqtt,
}

impl BrokerScheme {
    /// Returns the default port for this scheme.
    pub fn default_port(&self) -> u16 {
        1883
    }
}

/// Parsed broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    pub scheme: BrokerScheme,
    pub host: String,
    pub port: u16,
}

impl BrokerAddress {
    /// Parses `tcp://host:port` or `mqtt://host[:port]`.
    pub fn parse(uri: &str) -> Result<Self, String> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| format!("missing scheme in broker URI '{}'", uri))?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "tcp" => BrokerScheme::Tcp,
            "mqtt" => BrokerScheme::Mqtt,
            other => return Err(format!("unsupported broker scheme '{}'", other)),
        };

        let authority = rest.trim_end_matches('/');
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid broker port '{}'", port))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err("broker host cannot be empty".to_string());
        }
        if port == 0 {
            return Err("broker port cannot be 0".to_string());
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            BrokerScheme::Tcp => "tcp",
            BrokerScheme::Mqtt => "mqtt",
        };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Reconnection policy for the broker connection.
///
/// The delay before attempt `n` is `delay * backoff_multiplier^n`, capped at
/// `max_delay`. With the default multiplier of 1.0 every retry waits the same
/// fixed interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Whether the manager retries on its own after failures
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Consecutive failed handshakes tolerated before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before each retry
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,

    /// Multiplier applied per consecutive failure
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for the computed delay
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            delay_secs: default_retry_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl ReconnectConfig {
    /// Base delay before a retry.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Upper bound for any retry delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

/// Settings for the connection to the shared broker.
///
/// # Examples
///
/// ```
/// use moveecho_core::types::BrokerConfig;
///
/// let config = BrokerConfig::builder()
///     .uri("tcp://10.0.0.5:1883")
///     .topic("moveecho/locations")
///     .build();
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.address().unwrap().port, 1883);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker URI, `tcp://host:port`
    #[serde(default = "default_broker_uri")]
    pub uri: String,

    /// Shared location topic
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Delivery guarantee for location updates
    #[serde(default)]
    pub qos: QoS,

    /// Whether the broker should retain the last message
    #[serde(default)]
    pub retained: bool,

    /// Prefix for the generated client identity
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,

    /// Handshake timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// MQTT keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Start every connection without persisted session state
    #[serde(default = "default_true")]
    pub clean_session: bool,

    /// Capacity of the outbound request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    /// Reconnection policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_broker_uri() -> String {
    "tcp://127.0.0.1:1883".to_string()
}

fn default_topic() -> String {
    DEFAULT_LOCATION_TOPIC.to_string()
}

fn default_client_id_prefix() -> String {
    DEFAULT_CLIENT_ID_PREFIX.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_request_capacity() -> usize {
    64
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            uri: default_broker_uri(),
            topic: default_topic(),
            qos: QoS::AtMostOnce,
            retained: false,
            client_id_prefix: default_client_id_prefix(),
            connect_timeout_secs: default_connect_timeout_secs(),
            keep_alive_secs: default_keep_alive_secs(),
            clean_session: true,
            request_capacity: default_request_capacity(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Creates a new builder for BrokerConfig.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Parses the configured URI.
    pub fn address(&self) -> Result<BrokerAddress, String> {
        BrokerAddress::parse(&self.uri)
    }

    /// Handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Validates the broker configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.address()?;

        if self.topic.is_empty() {
            return Err("Topic cannot be empty".to_string());
        }

        if self.topic.contains('#') || self.topic.contains('+') {
            return Err(format!("Topic '{}' must not contain wildcards", self.topic));
        }

        if self.client_id_prefix.is_empty() {
            return Err("Client id prefix cannot be empty".to_string());
        }

        if self.connect_timeout_secs == 0 {
            return Err("Connect timeout cannot be 0".to_string());
        }

        if self.request_capacity == 0 {
            return Err("Request capacity cannot be 0".to_string());
        }

        if self.reconnect.backoff_multiplier < 1.0 {
            return Err("Backoff multiplier must be at least 1.0".to_string());
        }

        if self.reconnect.enabled && self.reconnect.max_attempts == 0 {
            return Err("Retry budget cannot be 0 while reconnect is enabled".to_string());
        }

        Ok(())
    }
}

/// Builder for BrokerConfig.
#[derive(Default)]
pub struct BrokerConfigBuilder {
    uri: Option<String>,
    topic: Option<String>,
    qos: Option<QoS>,
    retained: Option<bool>,
    client_id_prefix: Option<String>,
    connect_timeout_secs: Option<u64>,
    reconnect: Option<ReconnectConfig>,
}

impl BrokerConfigBuilder {
    /// Sets the broker URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the location topic.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the delivery guarantee.
    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = Some(qos);
        self
    }

    /// Sets the retain flag.
    pub fn retained(mut self, retained: bool) -> Self {
        self.retained = Some(retained);
        self
    }

    /// Sets the client identity prefix.
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = Some(prefix.into());
        self
    }

    /// Sets the handshake timeout.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Sets the reconnect policy.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = Some(reconnect);
        self
    }

    /// Builds the BrokerConfig.
    pub fn build(self) -> BrokerConfig {
        let defaults = BrokerConfig::default();
        BrokerConfig {
            uri: self.uri.unwrap_or(defaults.uri),
            topic: self.topic.unwrap_or(defaults.topic),
            qos: self.qos.unwrap_or(defaults.qos),
            retained: self.retained.unwrap_or(defaults.retained),
            client_id_prefix: self.client_id_prefix.unwrap_or(defaults.client_id_prefix),
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            reconnect: self.reconnect.unwrap_or(defaults.reconnect),
            ..defaults
        }
    }
}
