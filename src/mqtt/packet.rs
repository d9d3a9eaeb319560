//! MQTT 3.1.1 packet codec (client side).
//!
//! Only the packets a publish-only client needs are encoded:
//! CONNECT, PUBLISH (QoS 0/1) and DISCONNECT.  The decoder understands
//! CONNACK, PUBACK and PINGRESP and reports any other type as
//! [`Packet::Other`] so the caller can ignore it.
//!
//! Wire format of every control packet:
//! ```text
//! ┌──────────────┬──────────────────────────┬────────────────────────┐
//! │ type | flags │ remaining length (1-4 B) │ variable header + body │
//! │ 1 B          │ 7-bit groups, LSB first  │ N B                    │
//! └──────────────┴──────────────────────────┴────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete packets,
//! so a single transport read may hold part of a packet or several.

use core::fmt;

/// Largest remaining length the variable-length encoding can express.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Upper bound for inbound packets.  A publish-only client only ever
/// receives small acknowledgements; anything larger is dropped.
const MAX_INBOUND_PACKET: usize = 4096;

/// Protocol level byte for MQTT 3.1.1.
const PROTOCOL_LEVEL: u8 = 0x04;

const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const PINGRESP: u8 = 0xD0;

/// Encoded PINGREQ packet (no variable header, no payload).
pub const PINGREQ: [u8; 2] = [0xC0, 0x00];

/// Encoded DISCONNECT packet (no variable header, no payload).
pub const DISCONNECT: [u8; 2] = [0xE0, 0x00];

// ───────────────────────────────────────────────────────────────
// Quality of service / return codes
// ───────────────────────────────────────────────────────────────

/// Delivery guarantee requested for a PUBLISH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// Fire and forget; no acknowledgement.
    AtMostOnce = 0,
    /// Broker answers with PUBACK; duplicates possible, loss is not.
    AtLeastOnce = 1,
}

/// CONNACK return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnackCode {
    Accepted,
    UnacceptableProtocolVersion,
    IdentifierRejected,
    ServerUnavailable,
    BadCredentials,
    NotAuthorized,
    /// Reserved values 6-255.
    Unknown(u8),
}

impl From<u8> for ConnackCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadCredentials,
            5 => Self::NotAuthorized,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ConnackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::UnacceptableProtocolVersion => write!(f, "unacceptable protocol version"),
            Self::IdentifierRejected => write!(f, "identifier rejected"),
            Self::ServerUnavailable => write!(f, "server unavailable"),
            Self::BadCredentials => write!(f, "bad user name or password"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::Unknown(code) => write!(f, "reserved return code {code}"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// A UTF-8 string or binary field exceeds 65 535 bytes.
    StringTooLong,
    /// Remaining length exceeds [`MAX_REMAINING_LENGTH`].
    PacketTooLarge,
    /// QoS 1 requires a non-zero packet identifier.
    MissingPacketId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Bad flags, wrong remaining length, or a 5-byte length prefix.
    Malformed,
    /// Inbound packet larger than the client accepts.
    TooLarge,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed packet"),
            Self::TooLarge => write!(f, "packet too large"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Outbound packets
// ───────────────────────────────────────────────────────────────

/// Optional user name / password pair for CONNECT.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: Option<&'a [u8]>,
}

/// CONNECT packet fields.
#[derive(Debug, Clone, Copy)]
pub struct Connect<'a> {
    pub client_id: &'a str,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
    pub credentials: Option<Credentials<'a>>,
}

impl Connect<'_> {
    /// Append the encoded packet to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mut body = Vec::with_capacity(16 + self.client_id.len());
        write_bytes(&mut body, b"MQTT")?;
        body.push(PROTOCOL_LEVEL);

        let mut flags = 0u8;
        if self.clean_session {
            flags |= 0x02;
        }
        if let Some(creds) = &self.credentials {
            flags |= 0x80;
            if creds.password.is_some() {
                flags |= 0x40;
            }
        }
        body.push(flags);
        body.extend_from_slice(&self.keep_alive_secs.to_be_bytes());

        write_bytes(&mut body, self.client_id.as_bytes())?;
        if let Some(creds) = &self.credentials {
            write_bytes(&mut body, creds.username.as_bytes())?;
            if let Some(password) = creds.password {
                write_bytes(&mut body, password)?;
            }
        }

        finish(CONNECT, &body, out)
    }
}

/// PUBLISH packet fields.
#[derive(Debug, Clone, Copy)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub qos: QoS,
    pub retain: bool,
    /// Required (non-zero) for QoS 1, ignored for QoS 0.
    pub packet_id: Option<u16>,
    pub payload: &'a [u8],
}

impl Publish<'_> {
    /// Append the encoded packet to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mut body = Vec::with_capacity(2 + self.topic.len() + 2 + self.payload.len());
        write_bytes(&mut body, self.topic.as_bytes())?;
        if self.qos == QoS::AtLeastOnce {
            match self.packet_id {
                Some(id) if id != 0 => body.extend_from_slice(&id.to_be_bytes()),
                _ => return Err(EncodeError::MissingPacketId),
            }
        }
        body.extend_from_slice(self.payload);

        let mut header = PUBLISH | ((self.qos as u8) << 1);
        if self.retain {
            header |= 0x01;
        }
        finish(header, &body, out)
    }
}

fn write_bytes(out: &mut Vec<u8>, data: &[u8]) -> Result<(), EncodeError> {
    let len = u16::try_from(data.len()).map_err(|_| EncodeError::StringTooLong)?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(data);
    Ok(())
}

fn finish(header: u8, body: &[u8], out: &mut Vec<u8>) -> Result<(), EncodeError> {
    out.push(header);
    encode_remaining_length(body.len(), out)?;
    out.extend_from_slice(body);
    Ok(())
}

/// Append the variable-length remaining-length field.
pub fn encode_remaining_length(mut len: usize, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(EncodeError::PacketTooLarge);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

/// Decode a remaining-length prefix.
///
/// Returns `Ok(None)` while more bytes are needed, otherwise the value
/// and the number of prefix bytes consumed.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, DecodeError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &b) in bytes.iter().take(4).enumerate() {
        value += (b & 0x7F) as usize * multiplier;
        if b & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if bytes.len() >= 4 {
        Err(DecodeError::Malformed)
    } else {
        Ok(None)
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound packets
// ───────────────────────────────────────────────────────────────

/// A decoded broker → client packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet {
    ConnAck { session_present: bool, code: ConnackCode },
    PubAck { packet_id: u16 },
    PingResp,
    /// Any other control packet type (upper nibble of the first byte).
    Other { packet_type: u8 },
}

/// Streaming packet decoder.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buf: Vec<u8>,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append raw bytes read from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed by a packet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete packet from the buffer.
    ///
    /// On error the buffer is cleared; the stream cannot be resynchronised
    /// and the caller should drop the session.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, DecodeError> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let (remaining, prefix) = match decode_remaining_length(&self.buf[1..]) {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        if remaining > MAX_INBOUND_PACKET {
            self.reset();
            return Err(DecodeError::TooLarge);
        }
        let total = 1 + prefix + remaining;
        if self.buf.len() < total {
            return Ok(None);
        }

        let header = self.buf[0];
        let body = &self.buf[1 + prefix..total];
        let packet = match parse(header, body) {
            Ok(p) => p,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        self.buf.drain(..total);
        Ok(Some(packet))
    }

    /// Discard buffered bytes (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

fn parse(header: u8, body: &[u8]) -> Result<Packet, DecodeError> {
    match header & 0xF0 {
        CONNACK => {
            if header != CONNACK || body.len() != 2 || body[0] & 0xFE != 0 {
                return Err(DecodeError::Malformed);
            }
            Ok(Packet::ConnAck {
                session_present: body[0] & 0x01 != 0,
                code: ConnackCode::from(body[1]),
            })
        }
        PUBACK => {
            if header != PUBACK || body.len() != 2 {
                return Err(DecodeError::Malformed);
            }
            Ok(Packet::PubAck {
                packet_id: u16::from_be_bytes([body[0], body[1]]),
            })
        }
        PINGRESP => {
            if header != PINGRESP || !body.is_empty() {
                return Err(DecodeError::Malformed);
            }
            Ok(Packet::PingResp)
        }
        other => Ok(Packet::Other {
            packet_type: other >> 4,
        }),
    }
}
