//! Unified error types for the tracker.
//!
//! Every subsystem owns a small `Copy` error enum; the top-level [`Error`]
//! funnels them together so the worker loop can log any failure uniformly.
//! None of these are fatal: callers log them and continue with the next fix.

use core::fmt;

use crate::mqtt::packet::ConnackCode;

// ---------------------------------------------------------------------------
// Top-level tracker error
// ---------------------------------------------------------------------------

/// Every fallible tracker operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The fix or dose rate could not be turned into a payload.
    Payload(PayloadError),
    /// The broker session could not be established.
    Connect(ConnectError),
    /// A message could not be delivered.
    Publish(PublishError),
    /// The orderly disconnect failed.
    Disconnect(DisconnectError),
    /// No dose-rate reading was available.
    DoseRate(DoseRateError),
    /// The location subscription could not be opened.
    Location(LocationError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(e) => write!(f, "payload: {e}"),
            Self::Connect(e) => write!(f, "connect: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Disconnect(e) => write!(f, "disconnect: {e}"),
            Self::DoseRate(e) => write!(f, "dose rate: {e}"),
            Self::Location(e) => write!(f, "location: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Latitude outside [-90, 90].
    LatitudeOutOfRange,
    /// Longitude outside [-180, 180].
    LongitudeOutOfRange,
    /// Dose rate below zero.
    NegativeDoseRate,
    /// NaN or infinity in any numeric field.
    NotFinite,
    /// JSON encoding failed.
    Encode,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LatitudeOutOfRange => write!(f, "latitude out of range"),
            Self::LongitudeOutOfRange => write!(f, "longitude out of range"),
            Self::NegativeDoseRate => write!(f, "negative dose rate"),
            Self::NotFinite => write!(f, "non-finite value"),
            Self::Encode => write!(f, "JSON encoding failed"),
        }
    }
}

impl std::error::Error for PayloadError {}

impl From<PayloadError> for Error {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

// ---------------------------------------------------------------------------
// Broker session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// TCP connect or socket I/O failed.
    Io,
    /// TLS handshake failed.
    Tls,
    /// No CONNACK before the connect timeout.
    Timeout,
    /// The broker answered CONNACK with a non-zero return code.
    Refused(ConnackCode),
    /// The broker sent something other than a well-formed CONNACK.
    Protocol,
    /// Client identifier or credentials cannot be encoded.
    InvalidOptions,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "TCP/socket I/O error"),
            Self::Tls => write!(f, "TLS handshake failed"),
            Self::Timeout => write!(f, "timed out waiting for CONNACK"),
            Self::Refused(code) => write!(f, "broker refused connection: {code}"),
            Self::Protocol => write!(f, "unexpected packet during handshake"),
            Self::InvalidOptions => write!(f, "invalid connect options"),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The lazy reconnect before sending failed.
    Connect(ConnectError),
    /// No session and reconnecting is not possible (channel shut down).
    NotConnected,
    /// Socket write/read failed mid-publish.
    Io,
    /// No PUBACK before the acknowledgement timeout.
    Timeout,
    /// Topic is empty, too long, or contains wildcards.
    InvalidTopic,
    /// Packet would exceed the MQTT remaining-length limit.
    PayloadTooLarge,
    /// The broker sent a malformed or unexpected packet.
    Protocol,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "reconnect failed: {e}"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Io => write!(f, "TCP/socket I/O error"),
            Self::Timeout => write!(f, "timed out waiting for PUBACK"),
            Self::InvalidTopic => write!(f, "invalid topic"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::Protocol => write!(f, "unexpected packet from broker"),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<ConnectError> for PublishError {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectError {
    /// DISCONNECT could not be written.
    Io,
}

impl fmt::Display for DisconnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "TCP/socket I/O error"),
        }
    }
}

impl std::error::Error for DisconnectError {}

impl From<DisconnectError> for Error {
    fn from(e: DisconnectError) -> Self {
        Self::Disconnect(e)
    }
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseRateError {
    /// The probe has no reading yet or is disconnected.
    Unavailable,
}

impl fmt::Display for DoseRateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "no reading available"),
        }
    }
}

impl std::error::Error for DoseRateError {}

impl From<DoseRateError> for Error {
    fn from(e: DoseRateError) -> Self {
        Self::DoseRate(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    /// The location permission gate is closed.
    PermissionDenied,
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "location permission not granted"),
        }
    }
}

impl std::error::Error for LocationError {}

impl From<LocationError> for Error {
    fn from(e: LocationError) -> Self {
        Self::Location(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Tracker-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
