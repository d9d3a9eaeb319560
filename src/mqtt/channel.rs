//! Publish channel: the single outbound broker session.
//!
//! ```text
//!            ensure_connected() ok
//!  Disconnected ─────────────────────▶ Connected
//!       ▲                                  │
//!       └──── shutdown() / I/O error ──────┘
//!             / PUBACK timeout / no PINGRESP
//! ```
//!
//! The session is opened lazily: [`PublishChannel::publish`] calls
//! [`PublishChannel::ensure_connected`] first, also after [`shutdown`].
//! There is no background task.  Once the session has been idle for the
//! announced keep-alive, `ensure_connected` sends a PINGREQ before reusing
//! it; a missing PINGRESP drops the session and opens a fresh one.  Nothing
//! else is retried; every failure is returned to the caller.
//!
//! [`shutdown`]: PublishChannel::shutdown
//!
//! All calls block the calling thread for the network round trip.

use core::time::Duration;
use std::time::Instant;

use log::{debug, info, warn};

use super::packet::{
    ConnackCode, Connect, Credentials, DISCONNECT, DecodeError, EncodeError, PINGREQ, Packet,
    PacketDecoder, Publish, QoS,
};
use super::topic::{ClientIdString, validate_publish_topic};
use super::transport::{Connector, Endpoint, Transport, TransportError};
use crate::error::{ConnectError, DisconnectError, PublishError};

/// Pause between empty reads while waiting for an acknowledgement.
const POLL_BACKOFF: Duration = Duration::from_millis(1);

const READ_CHUNK: usize = 256;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// CONNECT parameters and acknowledgement timeouts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub client_id: ClientIdString,
    pub keep_alive_secs: u16,
    /// Budget for the CONNACK after the transport is up.
    pub connect_timeout: Duration,
    /// Budget for each PUBACK.
    pub ack_timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Transport connects attempted.
    pub connect_attempts: u32,
    /// CONNACKs accepted.
    pub handshakes: u32,
    /// Messages acknowledged (or written, for QoS 0).
    pub published: u32,
    /// Publishes that returned an error.
    pub failed: u32,
}

struct Session<T> {
    transport: T,
    decoder: PacketDecoder,
    /// Last control packet sent; the keep-alive is measured from here.
    last_sent: Instant,
}

enum WaitError {
    Timeout,
    Transport(TransportError),
    Decode(DecodeError),
}

impl<T: Transport> Session<T> {
    fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        self.transport.write_all(packet)?;
        self.last_sent = Instant::now();
        Ok(())
    }

    /// Block until the next inbound packet or `deadline`.
    fn next_packet(&mut self, deadline: Instant) -> Result<Packet, WaitError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            if let Some(packet) = self.decoder.next_packet().map_err(WaitError::Decode)? {
                return Ok(packet);
            }
            let n = self.transport.read(&mut buf).map_err(WaitError::Transport)?;
            if n > 0 {
                self.decoder.push(&buf[..n]);
                continue;
            }
            if Instant::now() >= deadline {
                return Err(WaitError::Timeout);
            }
            std::thread::sleep(POLL_BACKOFF);
        }
    }
}

/// Owns at most one broker session and publishes through it.
pub struct PublishChannel<C: Connector> {
    connector: C,
    endpoint: Endpoint,
    options: SessionOptions,
    session: Option<Session<C::Transport>>,
    next_packet_id: u16,
    stats: ChannelStats,
}

impl<C: Connector> PublishChannel<C> {
    pub fn new(connector: C, endpoint: Endpoint, options: SessionOptions) -> Self {
        Self {
            connector,
            endpoint,
            options,
            session: None,
            next_packet_id: 1,
            stats: ChannelStats::default(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        if self.session.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn client_id(&self) -> &str {
        self.options.client_id.as_str()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Open the session unless it is already up.
    ///
    /// An existing session idle for at least the keep-alive interval is
    /// pinged first and replaced when the broker does not answer.
    pub fn ensure_connected(&mut self) -> Result<(), ConnectError> {
        if self.session.is_some() {
            if !self.keep_alive_due() {
                return Ok(());
            }
            let timeout = self.options.connect_timeout;
            let alive = self
                .session
                .as_mut()
                .is_some_and(|session| Self::ping(session, timeout));
            if alive {
                return Ok(());
            }
            warn!("MQTT: no PINGRESP from {}, reconnecting", self.endpoint);
            self.drop_session();
        }

        let mut connect = Vec::with_capacity(32 + self.options.client_id.len());
        Connect {
            client_id: self.options.client_id.as_str(),
            keep_alive_secs: self.options.keep_alive_secs,
            clean_session: true,
            credentials: self.options.username.as_deref().map(|username| Credentials {
                username,
                password: self.options.password.as_deref().map(str::as_bytes),
            }),
        }
        .encode(&mut connect)
        .map_err(|_| ConnectError::InvalidOptions)?;

        self.stats.connect_attempts += 1;
        info!(
            "MQTT: connecting to {} as {}",
            self.endpoint, self.options.client_id
        );
        let transport = self.connector.connect(&self.endpoint).inspect_err(|e| {
            warn!("MQTT: transport to {} failed: {}", self.endpoint, e);
        })?;

        let mut session = Session {
            transport,
            decoder: PacketDecoder::new(),
            last_sent: Instant::now(),
        };
        let result = Self::handshake(&mut session, &connect, self.options.connect_timeout);
        match result {
            Ok(()) => {
                self.stats.handshakes += 1;
                self.session = Some(session);
                info!("MQTT: connected to {}", self.endpoint);
                Ok(())
            }
            Err(e) => {
                session.transport.close();
                warn!("MQTT: handshake with {} failed: {}", self.endpoint, e);
                Err(e)
            }
        }
    }

    fn handshake(
        session: &mut Session<C::Transport>,
        connect: &[u8],
        timeout: Duration,
    ) -> Result<(), ConnectError> {
        session.send(connect).map_err(connect_error_from_transport)?;

        let deadline = Instant::now() + timeout;
        match session.next_packet(deadline) {
            Ok(Packet::ConnAck {
                code: ConnackCode::Accepted,
                ..
            }) => Ok(()),
            Ok(Packet::ConnAck { code, .. }) => Err(ConnectError::Refused(code)),
            Ok(_) | Err(WaitError::Decode(_)) => Err(ConnectError::Protocol),
            Err(WaitError::Timeout) => Err(ConnectError::Timeout),
            Err(WaitError::Transport(e)) => Err(connect_error_from_transport(e)),
        }
    }

    fn keep_alive_due(&self) -> bool {
        let keep_alive = Duration::from_secs(u64::from(self.options.keep_alive_secs));
        match &self.session {
            Some(session) if !keep_alive.is_zero() => session.last_sent.elapsed() >= keep_alive,
            _ => false,
        }
    }

    /// PINGREQ round trip.  `false` when the broker stays silent or the
    /// transport fails.
    fn ping(session: &mut Session<C::Transport>, timeout: Duration) -> bool {
        debug!("MQTT: keep-alive PINGREQ");
        if session.send(&PINGREQ).is_err() {
            return false;
        }
        let deadline = Instant::now() + timeout;
        loop {
            match session.next_packet(deadline) {
                Ok(Packet::PingResp) => return true,
                Ok(Packet::PubAck { .. } | Packet::Other { .. }) => {}
                Ok(Packet::ConnAck { .. }) | Err(_) => return false,
            }
        }
    }

    /// Publish `payload` on `topic`.
    ///
    /// Reconnects first if needed.  For [`QoS::AtLeastOnce`] returns once the
    /// matching PUBACK arrived.  Any transport failure or timeout drops the
    /// session so the next call starts a fresh connection.
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), PublishError> {
        let result = self.try_publish(topic, payload, qos);
        match result {
            Ok(()) => self.stats.published += 1,
            Err(_) => self.stats.failed += 1,
        }
        result
    }

    fn try_publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), PublishError> {
        validate_publish_topic(topic)?;

        let packet_id = match qos {
            QoS::AtMostOnce => None,
            QoS::AtLeastOnce => Some(self.alloc_packet_id()),
        };
        let mut packet = Vec::with_capacity(topic.len() + payload.len() + 8);
        Publish {
            topic,
            qos,
            retain: false,
            packet_id,
            payload,
        }
        .encode(&mut packet)
        .map_err(|e| match e {
            EncodeError::PacketTooLarge | EncodeError::StringTooLong => {
                PublishError::PayloadTooLarge
            }
            EncodeError::MissingPacketId => PublishError::Protocol,
        })?;

        self.ensure_connected()?;
        let ack_timeout = self.options.ack_timeout;
        let session = self.session.as_mut().ok_or(PublishError::NotConnected)?;
        let outcome = Self::deliver(session, &packet, packet_id, ack_timeout);
        if let Err(e) = outcome {
            warn!("MQTT: publish to '{}' failed: {}", topic, e);
            self.drop_session();
        } else {
            debug!("MQTT: published {} bytes to '{}'", payload.len(), topic);
        }
        outcome
    }

    fn deliver(
        session: &mut Session<C::Transport>,
        packet: &[u8],
        packet_id: Option<u16>,
        ack_timeout: Duration,
    ) -> Result<(), PublishError> {
        session.send(packet).map_err(|_| PublishError::Io)?;

        let Some(expected) = packet_id else {
            return Ok(());
        };

        let deadline = Instant::now() + ack_timeout;
        loop {
            match session.next_packet(deadline) {
                Ok(Packet::PubAck { packet_id }) if packet_id == expected => return Ok(()),
                Ok(Packet::PubAck { packet_id }) => {
                    debug!("MQTT: ignoring stale PUBACK {}", packet_id);
                }
                Ok(Packet::PingResp | Packet::Other { .. }) => {}
                Ok(Packet::ConnAck { .. }) | Err(WaitError::Decode(_)) => {
                    return Err(PublishError::Protocol);
                }
                Err(WaitError::Timeout) => return Err(PublishError::Timeout),
                Err(WaitError::Transport(_)) => return Err(PublishError::Io),
            }
        }
    }

    /// Orderly disconnect.  A no-op success when already disconnected.
    ///
    /// The channel stays usable; the next publish connects again.
    pub fn shutdown(&mut self) -> Result<(), DisconnectError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        let result = session.send(&DISCONNECT).map_err(|_| DisconnectError::Io);
        session.transport.close();
        info!("MQTT: disconnected from {}", self.endpoint);
        result
    }

    // ── Internal ──────────────────────────────────────────────

    fn drop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.transport.close();
            info!("MQTT: session to {} dropped", self.endpoint);
        }
    }

    fn alloc_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }
}

impl<C: Connector> Drop for PublishChannel<C> {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.shutdown() {
                warn!("MQTT: disconnect on drop failed: {}", e);
            }
        }
    }
}

fn connect_error_from_transport(e: TransportError) -> ConnectError {
    match e {
        TransportError::Tls => ConnectError::Tls,
        TransportError::Io | TransportError::Closed => ConnectError::Io,
    }
}
