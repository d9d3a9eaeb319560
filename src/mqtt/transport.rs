//! Transport abstraction: the byte stream under an MQTT session.
//!
//! Concrete implementations:
//! - TLS over TCP (rustls, production broker)
//! - plaintext TCP (local test brokers)
//! - scripted in-memory transports in the integration tests
//!
//! The [`PublishChannel`](super::channel::PublishChannel) is generic over
//! [`Connector`], so swapping the network stack requires no changes to the
//! session logic.

use core::fmt;
use core::time::Duration;

use crate::error::ConnectError;

/// Errors surfaced by a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Socket read/write failed.
    Io,
    /// TLS record or alert error.
    Tls,
    /// Peer closed the connection.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "socket I/O error"),
            Self::Tls => write!(f, "TLS session error"),
            Self::Closed => write!(f, "connection closed by peer"),
        }
    }
}

/// Byte-oriented, connected stream.
pub trait Transport {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 if no data arrived within the transport's poll interval.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data`, returning the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Flush any buffered output.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Close the stream (TLS close_notify where applicable).
    fn close(&mut self);

    /// Write all of `data` and flush.
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), TransportError> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(TransportError::Closed),
                n => data = &data[n..],
            }
        }
        self.flush()
    }
}

/// Where and how long to try connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens new transports; one call per connection attempt.
pub trait Connector {
    type Transport: Transport;

    /// Open a stream to `endpoint`, completing any TLS handshake.
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Self::Transport, ConnectError>;
}
