//! Telemetry payload builder.
//!
//! Turns a position fix plus a dose-rate reading into the JSON body the
//! command-post consumers expect:
//!
//! ```text
//! {"latitude":52.515,"longitude":13.405,"timestamp":1700000000000,"dose_rate":0.12}
//! ```
//!
//! Field names and order are fixed for wire compatibility.  Floats are
//! written in shortest round-trip form, so no GPS precision is lost.

use serde::{Deserialize, Serialize};

use crate::config::TimestampSource;
use crate::error::PayloadError;

use super::ports::Clock;

/// A single GPS sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Capture time, ms since the Unix epoch.
    pub captured_at_millis: i64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, captured_at_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at_millis,
        }
    }

    /// Check WGS-84 ranges.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(PayloadError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PayloadError::LatitudeOutOfRange);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(PayloadError::LongitudeOutOfRange);
        }
        Ok(())
    }
}

/// The message published for each fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryMessage {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "dose_rate")]
    pub dose_rate_usv_h: f64,
}

impl TelemetryMessage {
    /// Validate inputs and assemble a message stamped with `timestamp_ms`.
    pub fn new(
        fix: &PositionFix,
        dose_rate_usv_h: f64,
        timestamp_ms: i64,
    ) -> Result<Self, PayloadError> {
        fix.validate()?;
        if !dose_rate_usv_h.is_finite() {
            return Err(PayloadError::NotFinite);
        }
        if dose_rate_usv_h < 0.0 {
            return Err(PayloadError::NegativeDoseRate);
        }
        Ok(Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: timestamp_ms,
            dose_rate_usv_h,
        })
    }

    /// UTF-8 JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(|_| PayloadError::Encode)
    }
}

/// Build the wire payload, stamped with the clock's current time.
pub fn build(
    fix: &PositionFix,
    dose_rate_usv_h: f64,
    clock: &impl Clock,
) -> Result<Vec<u8>, PayloadError> {
    build_with(fix, dose_rate_usv_h, TimestampSource::Serialization, clock)
}

/// Build the wire payload with an explicit timestamp policy.
pub fn build_with(
    fix: &PositionFix,
    dose_rate_usv_h: f64,
    source: TimestampSource,
    clock: &impl Clock,
) -> Result<Vec<u8>, PayloadError> {
    stamp(fix, dose_rate_usv_h, source, clock)?.to_json()
}

/// Assemble the message without encoding it.
pub fn stamp(
    fix: &PositionFix,
    dose_rate_usv_h: f64,
    source: TimestampSource,
    clock: &impl Clock,
) -> Result<TelemetryMessage, PayloadError> {
    let timestamp = match source {
        TimestampSource::Serialization => clock.now_millis(),
        TimestampSource::Capture => fix.captured_at_millis,
    };
    TelemetryMessage::new(fix, dose_rate_usv_h, timestamp)
}
