//! Outbound tracker events.
//!
//! The [`TrackerService`](super::service::TrackerService) and the publish
//! worker emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them: log
//! them, or update the operator status display.

use crate::error::{ConnectError, DisconnectError, DoseRateError, PayloadError, PublishError};

use super::payload::{PositionFix, TelemetryMessage};

/// Structured events emitted by the tracker core.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// The service is up (carries team and client identifier).
    Started { team: u16, client_id: String },

    /// A new fix was taken from the location source.
    FixReceived(PositionFix),

    /// The broker session was established.
    Connected,

    /// The broker session could not be established.
    ConnectFailed(ConnectError),

    /// A message was acknowledged by the broker.
    Published(TelemetryMessage),

    /// A message could not be delivered and was dropped.
    PublishFailed(PublishError),

    /// The fix or dose rate was out of range; nothing was sent.
    FixRejected(PayloadError),

    /// No dose-rate reading; nothing was sent.
    DoseRateUnavailable(DoseRateError),

    /// Pending fixes replaced by newer ones before they were published.
    FixesSuperseded(u32),

    /// The broker session was closed on shutdown.
    Disconnected,

    /// The orderly disconnect failed; the session is gone regardless.
    DisconnectFailed(DisconnectError),
}
