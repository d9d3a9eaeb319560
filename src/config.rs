//! Tracker configuration parameters
//!
//! All tunable parameters for a deployed tracker.  Values come from a TOML
//! file and may be overridden on the command line; anything missing falls
//! back to the defaults below.

use core::fmt;
use core::time::Duration;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::mqtt::channel::SessionOptions;
use crate::mqtt::topic::{self, MAX_CLIENT_PREFIX_LEN, TopicString};
use crate::mqtt::transport::Endpoint;

/// Core tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Search team number, used in the topic path
    pub team_number: u16,
    /// Minimum spacing between published position fixes (milliseconds)
    pub location_interval_ms: u32,
    /// Dose rate reported while no probe is attached (µSv/h)
    pub dose_rate_usv_h: f64,
    pub broker: BrokerConfig,
    pub delivery: DeliveryConfig,
}

/// Broker connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    /// 8883 is the TLS alias port
    pub port: u16,
    /// Wrap the TCP stream in TLS
    pub tls: bool,
    /// Client identifier prefix; team and start time are appended
    pub client_id_prefix: String,
    pub keep_alive_secs: u16,
    /// TCP + TLS + CONNACK budget (milliseconds)
    pub connect_timeout_ms: u32,
    /// PUBACK budget (milliseconds)
    pub ack_timeout_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Delivery semantics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Log and drop failed publishes instead of reporting them to the caller
    pub best_effort: bool,
    /// Attempt the broker connection at startup rather than on the first fix
    pub connect_on_start: bool,
    pub backpressure: Backpressure,
    pub timestamp_source: TimestampSource,
}

/// What happens to fixes that arrive while a publish is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Keep only the newest pending fix.
    LatestOnly,
    /// Keep a short queue; evict the oldest when full.
    Fifo,
}

/// Which instant is written to the payload's `timestamp` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Wall clock when the payload is built.
    Serialization,
    /// Capture time carried by the fix.
    Capture,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            team_number: 1,
            location_interval_ms: 10_000, // matches the high-accuracy request cadence
            dose_rate_usv_h: 0.12,
            broker: BrokerConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "broker.hivemq.com".into(),
            port: 8883,
            tls: true,
            client_id_prefix: "radiocaching".into(),
            keep_alive_secs: 60,
            connect_timeout_ms: 10_000,
            ack_timeout_ms: 10_000,
            username: None,
            password: None,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            best_effort: true,
            connect_on_start: true,
            backpressure: Backpressure::LatestOnly,
            timestamp_source: TimestampSource::Serialization,
        }
    }
}

/// Errors from loading or validating a [`TrackerConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The config file does not exist.
    NotFound,
    /// The file exists but could not be read.
    Io(std::io::Error),
    /// The file is not valid TOML for this schema.
    Corrupted(String),
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Io(e) => write!(f, "config read failed: {}", e),
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl TrackerConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Corrupted(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values.  Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.team_number == 0 {
            return Err(ConfigError::ValidationFailed("team_number must be >= 1"));
        }
        if self.location_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "location_interval_ms must be > 0",
            ));
        }
        if !self.dose_rate_usv_h.is_finite() || self.dose_rate_usv_h < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "dose_rate_usv_h must be finite and >= 0",
            ));
        }

        let b = &self.broker;
        if b.host.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("broker.host is empty"));
        }
        if b.port == 0 {
            return Err(ConfigError::ValidationFailed("broker.port must be > 0"));
        }
        if b.client_id_prefix.is_empty() || b.client_id_prefix.len() > MAX_CLIENT_PREFIX_LEN {
            return Err(ConfigError::ValidationFailed(
                "broker.client_id_prefix must be 1-32 bytes",
            ));
        }
        if !b
            .client_id_prefix
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_')
        {
            return Err(ConfigError::ValidationFailed(
                "broker.client_id_prefix must be [A-Za-z0-9_-]",
            ));
        }
        if b.connect_timeout_ms == 0 || b.ack_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("broker timeouts must be > 0"));
        }
        if b.password.is_some() && b.username.is_none() {
            return Err(ConfigError::ValidationFailed(
                "broker.password requires broker.username",
            ));
        }
        Ok(())
    }

    // ── Derived values ────────────────────────────────────────

    pub fn topic(&self) -> TopicString {
        topic::coordinates_topic(self.team_number)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.location_interval_ms))
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.broker.host.clone(),
            port: self.broker.port,
            connect_timeout: Duration::from_millis(u64::from(self.broker.connect_timeout_ms)),
        }
    }

    /// Session options with a client id unique to a start at `now_ms`.
    pub fn session_options(&self, now_ms: i64) -> SessionOptions {
        SessionOptions {
            client_id: topic::client_id(&self.broker.client_id_prefix, self.team_number, now_ms),
            keep_alive_secs: self.broker.keep_alive_secs,
            connect_timeout: Duration::from_millis(u64::from(self.broker.connect_timeout_ms)),
            ack_timeout: Duration::from_millis(u64::from(self.broker.ack_timeout_ms)),
            username: self.broker.username.clone(),
            password: self.broker.password.clone(),
        }
    }
}
