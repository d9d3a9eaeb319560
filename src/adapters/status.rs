//! Operator status board.
//!
//! [`StatusBoard`] is an [`EventSink`] that keeps what the crew display
//! shows: team, dose rate, last coordinates, last publish time and whether
//! the broker is reachable.  The worker owns the board; any other thread
//! reads it through a cloned [`StatusHandle`].
//!
//! ```text
//! Strahlen-Spürtrupp: 1
//! Dosisleistung: 0.120 uSv/h
//! GPS Koordinaten: Lat: 52.51500, Lon: 13.40500
//! Letzter Zeitpunkt: 2023-11-14 22:13:20
//! Verbunden mit Server: Ja
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use crate::app::events::TrackerEvent;
use crate::app::ports::EventSink;

use super::time::format_utc;

/// Snapshot of the display fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerStatus {
    pub team: u16,
    pub dose_rate_usv_h: f64,
    /// `(latitude, longitude)` of the newest fix.
    pub position: Option<(f64, f64)>,
    /// Timestamp of the last acknowledged message.
    pub last_published_ms: Option<i64>,
    pub connected: bool,
}

impl TrackerStatus {
    pub fn coordinates_text(&self) -> String {
        match self.position {
            Some((lat, lon)) => format!("Lat: {:.5}, Lon: {:.5}", lat, lon),
            None => "Lat: -, Lon: -".to_string(),
        }
    }

    pub fn dose_rate_text(&self) -> String {
        format!("{:.3} uSv/h", self.dose_rate_usv_h)
    }

    pub fn last_time_text(&self) -> String {
        self.last_published_ms
            .map_or_else(|| "-".to_string(), format_utc)
    }

    pub fn render(&self) -> String {
        format!(
            "Strahlen-Spürtrupp: {}\n\
             Dosisleistung: {}\n\
             GPS Koordinaten: {}\n\
             Letzter Zeitpunkt: {}\n\
             Verbunden mit Server: {}",
            self.team,
            self.dose_rate_text(),
            self.coordinates_text(),
            self.last_time_text(),
            if self.connected { "Ja" } else { "Nein!" },
        )
    }
}

/// Read side of a [`StatusBoard`].
#[derive(Debug, Clone)]
pub struct StatusHandle(Arc<Mutex<TrackerStatus>>);

impl StatusHandle {
    pub fn snapshot(&self) -> TrackerStatus {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn render(&self) -> String {
        self.snapshot().render()
    }
}

/// Event sink maintaining the [`TrackerStatus`].
#[derive(Debug)]
pub struct StatusBoard {
    state: Arc<Mutex<TrackerStatus>>,
}

impl StatusBoard {
    pub fn new(team: u16, dose_rate_usv_h: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerStatus {
                team,
                dose_rate_usv_h,
                position: None,
                last_published_ms: None,
                connected: false,
            })),
        }
    }

    pub fn handle(&self) -> StatusHandle {
        StatusHandle(Arc::clone(&self.state))
    }
}

impl EventSink for StatusBoard {
    fn emit(&mut self, event: &TrackerEvent) {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            TrackerEvent::Started { team, .. } => s.team = *team,
            TrackerEvent::FixReceived(fix) => s.position = Some((fix.latitude, fix.longitude)),
            TrackerEvent::Connected => s.connected = true,
            TrackerEvent::Published(m) => {
                s.connected = true;
                s.dose_rate_usv_h = m.dose_rate_usv_h;
                s.last_published_ms = Some(m.timestamp);
            }
            TrackerEvent::ConnectFailed(_)
            | TrackerEvent::PublishFailed(_)
            | TrackerEvent::Disconnected
            | TrackerEvent::DisconnectFailed(_) => s.connected = false,
            TrackerEvent::FixRejected(_)
            | TrackerEvent::DoseRateUnavailable(_)
            | TrackerEvent::FixesSuperseded(_) => {}
        }
    }
}
