//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured tracker events through the
//! `log` facade (stderr via `env_logger` in the binary).

use log::{debug, info, warn};

use crate::app::events::TrackerEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`TrackerEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &TrackerEvent) {
        match event {
            TrackerEvent::Started { team, client_id } => {
                info!("START | team={} client_id={}", team, client_id);
            }
            TrackerEvent::FixReceived(fix) => {
                debug!(
                    "FIX   | lat={:.5} lon={:.5} t={}",
                    fix.latitude, fix.longitude, fix.captured_at_millis
                );
            }
            TrackerEvent::Connected => info!("MQTT  | connected"),
            TrackerEvent::ConnectFailed(e) => warn!("MQTT  | connect failed: {}", e),
            TrackerEvent::Published(m) => {
                info!(
                    "PUB   | lat={:.5} lon={:.5} ts={} dose={:.3}uSv/h",
                    m.latitude, m.longitude, m.timestamp, m.dose_rate_usv_h
                );
            }
            TrackerEvent::PublishFailed(e) => warn!("PUB   | failed: {}", e),
            TrackerEvent::FixRejected(e) => warn!("FIX   | rejected: {}", e),
            TrackerEvent::DoseRateUnavailable(e) => warn!("DOSE  | {}", e),
            TrackerEvent::FixesSuperseded(n) => debug!("FIX   | {} superseded", n),
            TrackerEvent::Disconnected => info!("MQTT  | disconnected"),
            TrackerEvent::DisconnectFailed(e) => warn!("MQTT  | disconnect failed: {}", e),
        }
    }
}
