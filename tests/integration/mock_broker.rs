//! Scripted in-memory broker for integration tests.
//!
//! [`MockConnector`] hands out [`MockTransport`]s that parse every packet
//! the client writes, record it in a shared [`BrokerLog`] and answer
//! CONNECT / PUBLISH / PINGREQ according to the current [`Script`].  The log lives
//! behind an `Arc<Mutex<_>>` so tests can inspect it after the connector
//! was moved into a worker thread.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use radiocaching::error::ConnectError;
use radiocaching::mqtt::packet::decode_remaining_length;
use radiocaching::mqtt::{Connector, Endpoint, Transport, TransportError};

// ── Recorded traffic ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Connect {
        client_id: String,
        username: Option<String>,
    },
    Publish {
        topic: String,
        qos: u8,
        packet_id: Option<u16>,
        payload: Vec<u8>,
    },
    PingReq,
    Disconnect,
    Other(u8),
}

/// How the broker answers.
#[derive(Debug, Clone)]
pub struct Script {
    /// Transport-level connect failure.
    pub connect_error: Option<ConnectError>,
    /// CONNACK return code (0 = accepted).
    pub connack_code: u8,
    /// Send a CONNACK at all.
    pub answer_connect: bool,
    /// Send PUBACKs for QoS 1 publishes.
    pub ack_publishes: bool,
    /// Answer each PUBACK with this id instead of the real one, once.
    pub stale_ack_first: Option<u16>,
    /// Send PINGRESP for PINGREQ.
    pub answer_ping: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            connect_error: None,
            connack_code: 0,
            answer_connect: true,
            ack_publishes: true,
            stale_ack_first: None,
            answer_ping: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct BrokerLog {
    pub script: Script,
    pub connect_attempts: u32,
    pub closes: u32,
    pub packets: Vec<Recorded>,
}

#[allow(dead_code)]
impl BrokerLog {
    pub fn publishes(&self) -> Vec<(String, Vec<u8>)> {
        self.packets
            .iter()
            .filter_map(|p| match p {
                Recorded::Publish { topic, payload, .. } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count_connects(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| matches!(p, Recorded::Connect { .. }))
            .count()
    }

    pub fn count_pings(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| matches!(p, Recorded::PingReq))
            .count()
    }

    pub fn count_disconnects(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| matches!(p, Recorded::Disconnect))
            .count()
    }
}

// ── Connector ─────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockConnector {
    log: Arc<Mutex<BrokerLog>>,
}

#[allow(dead_code)]
impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Script) -> Self {
        let c = Self::new();
        c.log().script = script;
        c
    }

    pub fn log(&self) -> MutexGuard<'_, BrokerLog> {
        self.log.lock().unwrap()
    }

    pub fn set_script(&self, script: Script) {
        self.log().script = script;
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&mut self, _endpoint: &Endpoint) -> Result<MockTransport, ConnectError> {
        let mut log = self.log();
        log.connect_attempts += 1;
        if let Some(e) = log.script.connect_error {
            return Err(e);
        }
        drop(log);
        Ok(MockTransport {
            log: Arc::clone(&self.log),
            outbound: Vec::new(),
            inbound: VecDeque::new(),
            closed: false,
        })
    }
}

// ── Transport ─────────────────────────────────────────────────

pub struct MockTransport {
    log: Arc<Mutex<BrokerLog>>,
    outbound: Vec<u8>,
    inbound: VecDeque<u8>,
    closed: bool,
}

impl MockTransport {
    fn process(&mut self) {
        loop {
            if self.outbound.len() < 2 {
                return;
            }
            let Ok(Some((remaining, prefix))) = decode_remaining_length(&self.outbound[1..]) else {
                return;
            };
            let total = 1 + prefix + remaining;
            if self.outbound.len() < total {
                return;
            }
            let header = self.outbound[0];
            let body: Vec<u8> = self.outbound[1 + prefix..total].to_vec();
            self.outbound.drain(..total);
            self.handle(header, &body);
        }
    }

    fn handle(&mut self, header: u8, body: &[u8]) {
        let mut log = self.log.lock().unwrap();
        match header >> 4 {
            1 => {
                let (client_id, username) = parse_connect(body);
                log.packets.push(Recorded::Connect {
                    client_id,
                    username,
                });
                if log.script.answer_connect {
                    let code = log.script.connack_code;
                    self.inbound.extend([0x20, 0x02, 0x00, code]);
                }
            }
            3 => {
                let qos = (header >> 1) & 0x03;
                let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                let topic = String::from_utf8(body[2..2 + topic_len].to_vec()).unwrap();
                let mut rest = &body[2 + topic_len..];
                let packet_id = if qos > 0 {
                    let id = u16::from_be_bytes([rest[0], rest[1]]);
                    rest = &rest[2..];
                    Some(id)
                } else {
                    None
                };
                log.packets.push(Recorded::Publish {
                    topic,
                    qos,
                    packet_id,
                    payload: rest.to_vec(),
                });
                if let (Some(id), true) = (packet_id, log.script.ack_publishes) {
                    if let Some(stale) = log.script.stale_ack_first.take() {
                        self.inbound.extend([0x40, 0x02]);
                        self.inbound.extend(stale.to_be_bytes());
                    }
                    self.inbound.extend([0x40, 0x02]);
                    self.inbound.extend(id.to_be_bytes());
                }
            }
            12 => {
                log.packets.push(Recorded::PingReq);
                if log.script.answer_ping {
                    self.inbound.extend([0xD0, 0x00]);
                }
            }
            14 => log.packets.push(Recorded::Disconnect),
            other => log.packets.push(Recorded::Other(other)),
        }
    }
}

fn parse_connect(body: &[u8]) -> (String, Option<String>) {
    // Protocol name (2 + 4), level, flags, keep-alive.
    let flags = body[7];
    let mut pos = 10;
    let take = |pos: &mut usize| {
        let len = u16::from_be_bytes([body[*pos], body[*pos + 1]]) as usize;
        let s = String::from_utf8(body[*pos + 2..*pos + 2 + len].to_vec()).unwrap();
        *pos += 2 + len;
        s
    };
    let client_id = take(&mut pos);
    let username = (flags & 0x80 != 0).then(|| take(&mut pos));
    (client_id, username)
}

impl Transport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.outbound.extend_from_slice(data);
        self.process();
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.lock().unwrap().closes += 1;
        }
    }
}
