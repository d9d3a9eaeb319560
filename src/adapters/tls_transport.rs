//! TCP and TLS transport adapters.
//!
//! Implement [`Connector`] / [`Transport`] for the broker connection.
//!
//! - [`TlsConnector`]: TCP wrapped in a rustls client session, verified
//!   against the Mozilla root set from `webpki-roots`.  Production default.
//! - [`TcpConnector`]: plaintext TCP for local test brokers.
//!
//! ## Read model
//!
//! Sockets carry a short read timeout, so `read()` returns `Ok(0)` when no
//! data arrived within [`READ_POLL`] instead of blocking the session's
//! deadline loop.  A clean close from the peer maps to
//! [`TransportError::Closed`].

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::ConnectError;
use crate::mqtt::transport::{Connector, Endpoint, Transport, TransportError};

/// Socket read timeout while a session is up.
pub const READ_POLL: Duration = Duration::from_millis(50);

// ───────────────────────────────────────────────────────────────
// Socket helpers
// ───────────────────────────────────────────────────────────────

fn open_tcp(endpoint: &Endpoint) -> Result<TcpStream, ConnectError> {
    let addrs = (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()
        .map_err(|e| {
            warn!("TLS: cannot resolve {}: {}", endpoint, e);
            ConnectError::Io
        })?;

    let mut last = ConnectError::Io;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, endpoint.connect_timeout) {
            Ok(stream) => {
                stream
                    .set_nodelay(true)
                    .and_then(|()| stream.set_write_timeout(Some(endpoint.connect_timeout)))
                    .map_err(|_| ConnectError::Io)?;
                debug!("TLS: TCP connected to {}", addr);
                return Ok(stream);
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => last = ConnectError::Timeout,
            Err(e) => {
                debug!("TLS: TCP connect to {} failed: {}", addr, e);
                last = ConnectError::Io;
            }
        }
    }
    Err(last)
}

fn map_read(result: io::Result<usize>) -> Result<usize, TransportError> {
    match result {
        Ok(0) => Err(TransportError::Closed),
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                Ok(0)
            }
            io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset => {
                Err(TransportError::Closed)
            }
            io::ErrorKind::InvalidData => Err(TransportError::Tls),
            _ => Err(TransportError::Io),
        },
    }
}

fn map_write(result: io::Result<usize>) -> Result<usize, TransportError> {
    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(TransportError::Tls),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(TransportError::Closed),
        Err(_) => Err(TransportError::Io),
    }
}

// ───────────────────────────────────────────────────────────────
// Plaintext TCP
// ───────────────────────────────────────────────────────────────

/// Plaintext TCP stream.
pub struct TcpTransport {
    stream: TcpStream,
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        map_read(self.stream.read(buf))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        map_write(self.stream.write(data))
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.stream.flush().map_err(|_| TransportError::Io)
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Opens [`TcpTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&mut self, endpoint: &Endpoint) -> Result<TcpTransport, ConnectError> {
        let stream = open_tcp(endpoint)?;
        stream
            .set_read_timeout(Some(READ_POLL))
            .map_err(|_| ConnectError::Io)?;
        info!("TLS: plaintext session to {}", endpoint);
        Ok(TcpTransport { stream })
    }
}

// ───────────────────────────────────────────────────────────────
// TLS
// ───────────────────────────────────────────────────────────────

/// rustls client session over TCP.
pub struct TlsTransport {
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl Transport for TlsTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        map_read(self.stream.read(buf))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        map_write(self.stream.write(data))
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.stream.flush().map_err(|_| TransportError::Io)
    }

    fn close(&mut self) {
        self.stream.conn.send_close_notify();
        let _ = self.stream.conn.complete_io(&mut self.stream.sock);
        let _ = self.stream.sock.shutdown(Shutdown::Both);
    }
}

/// Opens [`TlsTransport`]s with a shared client configuration.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
}

impl TlsConnector {
    /// Client configuration trusting the bundled Mozilla roots.
    pub fn new() -> Result<Self, ConnectError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots)
    }

    /// Client configuration trusting only `roots`.
    pub fn with_roots(roots: RootCertStore) -> Result<Self, ConnectError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| {
                warn!("TLS: client config rejected: {}", e);
                ConnectError::Tls
            })?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self::with_config(Arc::new(config)))
    }

    pub fn with_config(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }
}

impl Connector for TlsConnector {
    type Transport = TlsTransport;

    fn connect(&mut self, endpoint: &Endpoint) -> Result<TlsTransport, ConnectError> {
        let server_name = ServerName::try_from(endpoint.host.clone()).map_err(|_| {
            warn!("TLS: '{}' is not a valid server name", endpoint.host);
            ConnectError::InvalidOptions
        })?;
        let mut conn = ClientConnection::new(Arc::clone(&self.config), server_name)
            .map_err(|_| ConnectError::Tls)?;

        let mut sock = open_tcp(endpoint)?;
        sock.set_read_timeout(Some(endpoint.connect_timeout))
            .map_err(|_| ConnectError::Io)?;
        while conn.is_handshaking() {
            if let Err(e) = conn.complete_io(&mut sock) {
                warn!("TLS: handshake with {} failed: {}", endpoint, e);
                let _ = sock.shutdown(Shutdown::Both);
                return Err(match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ConnectError::Timeout,
                    io::ErrorKind::InvalidData => ConnectError::Tls,
                    _ => ConnectError::Io,
                });
            }
        }
        sock.set_read_timeout(Some(READ_POLL))
            .map_err(|_| ConnectError::Io)?;

        info!(
            "TLS: session with {} established ({:?}, {:?})",
            endpoint,
            conn.protocol_version(),
            conn.negotiated_cipher_suite().map(|s| s.suite())
        );
        Ok(TlsTransport {
            stream: StreamOwned::new(conn, sock),
        })
    }
}
