//! Port traits: the boundary between the publishing core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TrackerService (domain)
//! ```
//!
//! Driven adapters (GPS receiver, dose-rate probe, clock, status display)
//! implement these traits.  The [`TrackerService`](super::service::TrackerService)
//! consumes them via generics, so the core never touches a device directly.

use crate::error::{DoseRateError, LocationError};

use super::events::TrackerEvent;
use super::payload::PositionFix;

// ───────────────────────────────────────────────────────────────
// Location port (driven adapter: GPS → domain)
// ───────────────────────────────────────────────────────────────

/// A source of position fixes.
///
/// Subscribing consumes the source: the resulting sequence is lazy,
/// potentially infinite, and cannot be restarted.
pub trait LocationSource {
    type Fixes: Iterator<Item = PositionFix>;

    /// Whether the operator allowed location access.  The core only
    /// reads this gate; granting it is the host platform's job.
    fn permission_granted(&self) -> bool;

    /// Start delivering fixes no closer together than `interval_ms`.
    fn subscribe(self, interval_ms: u32) -> Result<Self::Fixes, LocationError>;
}

// ───────────────────────────────────────────────────────────────
// Dose-rate port (driven adapter: probe → domain)
// ───────────────────────────────────────────────────────────────

/// Current ambient dose rate.
pub trait DoseRateSource {
    /// Latest reading in µSv/h.
    fn dose_rate_usv_h(&mut self) -> Result<f64, DoseRateError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / display)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`TrackerEvent`]s through this port.
/// Adapters decide where they go (log, status display, ...).
pub trait EventSink {
    fn emit(&mut self, event: &TrackerEvent);
}

/// Fan out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &TrackerEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &TrackerEvent) {
        (**self).emit(event);
    }
}
