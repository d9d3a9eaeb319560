//! Tracker service: the hexagonal core.
//!
//! [`TrackerService`] owns the publish channel and the dose-rate source.
//! It turns each position fix into a telemetry message and publishes it.
//! All I/O flows through port traits, making the whole service testable
//! with mock adapters.
//!
//! ```text
//!  PositionFix ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                  │      TrackerService      │
//! DoseRateSource ─▶│  payload · PublishChannel│ ──▶ broker
//!                  └──────────────────────────┘
//! ```
//!
//! In best-effort mode (the default) a failed fix is logged, reported as
//! [`PublishOutcome::Dropped`] and forgotten.  With best effort disabled the
//! same failure is returned as an error instead.  Nothing is retried in
//! either mode.

use log::{info, warn};

use crate::config::{TimestampSource, TrackerConfig};
use crate::error::{Error, PublishError};
use crate::mqtt::channel::{ChannelStats, ConnectionState, PublishChannel};
use crate::mqtt::packet::QoS;
use crate::mqtt::topic::TopicString;
use crate::mqtt::transport::Connector;

use super::events::TrackerEvent;
use super::payload::{self, PositionFix, TelemetryMessage};
use super::ports::{Clock, DoseRateSource, EventSink};

/// What became of one fix.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Acknowledged by the broker.
    Delivered(TelemetryMessage),
    /// Failed and dropped (best-effort mode only).
    Dropped(Error),
}

// ───────────────────────────────────────────────────────────────
// TrackerService
// ───────────────────────────────────────────────────────────────

/// Orchestrates payload building and publishing for one team.
pub struct TrackerService<C: Connector, D: DoseRateSource, K: Clock> {
    channel: PublishChannel<C>,
    dose: D,
    clock: K,
    topic: TopicString,
    team: u16,
    best_effort: bool,
    connect_on_start: bool,
    timestamp_source: TimestampSource,
}

impl<C: Connector, D: DoseRateSource, K: Clock> TrackerService<C, D, K> {
    /// Construct the service from configuration.
    ///
    /// Does **not** connect (call [`start`](Self::start) next).
    pub fn new(config: &TrackerConfig, connector: C, dose: D, clock: K) -> Self {
        let options = config.session_options(clock.now_millis());
        let channel = PublishChannel::new(connector, config.endpoint(), options);
        Self {
            channel,
            dose,
            clock,
            topic: config.topic(),
            team: config.team_number,
            best_effort: config.delivery.best_effort,
            connect_on_start: config.delivery.connect_on_start,
            timestamp_source: config.delivery.timestamp_source,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the service and, if configured, connect eagerly.
    ///
    /// A failed eager connect is only logged; the first fix retries it.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&TrackerEvent::Started {
            team: self.team,
            client_id: self.channel.client_id().to_string(),
        });
        info!(
            "TrackerService started: team {} -> '{}'",
            self.team, self.topic
        );
        if !self.connect_on_start {
            return;
        }
        match self.channel.ensure_connected() {
            Ok(()) => sink.emit(&TrackerEvent::Connected),
            Err(e) => {
                warn!("Initial connect failed ({}), will retry on first fix", e);
                sink.emit(&TrackerEvent::ConnectFailed(e));
            }
        }
    }

    /// Build and publish one fix.
    pub fn handle_fix(
        &mut self,
        fix: PositionFix,
        sink: &mut impl EventSink,
    ) -> Result<PublishOutcome, Error> {
        sink.emit(&TrackerEvent::FixReceived(fix));

        let dose = match self.dose.dose_rate_usv_h() {
            Ok(d) => d,
            Err(e) => {
                sink.emit(&TrackerEvent::DoseRateUnavailable(e));
                return self.fail(e.into());
            }
        };

        let message = payload::stamp(&fix, dose, self.timestamp_source, &self.clock)
            .and_then(|m| m.to_json().map(|bytes| (m, bytes)));
        let (message, bytes) = match message {
            Ok(v) => v,
            Err(e) => {
                sink.emit(&TrackerEvent::FixRejected(e));
                return self.fail(e.into());
            }
        };

        let was_connected = self.channel.is_connected();
        match self.channel.publish(&self.topic, &bytes, QoS::AtLeastOnce) {
            Ok(()) => {
                if !was_connected {
                    sink.emit(&TrackerEvent::Connected);
                }
                sink.emit(&TrackerEvent::Published(message));
                Ok(PublishOutcome::Delivered(message))
            }
            Err(e) => {
                if let PublishError::Connect(ce) = e {
                    sink.emit(&TrackerEvent::ConnectFailed(ce));
                }
                sink.emit(&TrackerEvent::PublishFailed(e));
                self.fail(e.into())
            }
        }
    }

    /// Orderly disconnect.  Safe to call when already disconnected.
    pub fn shutdown(&mut self, sink: &mut impl EventSink) {
        match self.channel.shutdown() {
            Ok(()) => sink.emit(&TrackerEvent::Disconnected),
            Err(e) => {
                warn!("Disconnect failed: {}", e);
                sink.emit(&TrackerEvent::DisconnectFailed(e));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    pub fn client_id(&self) -> &str {
        self.channel.client_id()
    }

    // ── Internal ──────────────────────────────────────────────

    fn fail(&self, e: Error) -> Result<PublishOutcome, Error> {
        if self.best_effort {
            warn!("Fix dropped: {}", e);
            Ok(PublishOutcome::Dropped(e))
        } else {
            Err(e)
        }
    }
}
