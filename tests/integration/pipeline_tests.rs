//! Pipeline integration tests.
//!
//! Backpressure policies, shutdown draining and the full NMEA → worker
//! thread → broker path.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use futures_lite::future::block_on;

use radiocaching::adapters::dose_rate::FixedDoseRate;
use radiocaching::adapters::nmea::{NmeaLocationSource, checksum};
use radiocaching::adapters::status::StatusBoard;
use radiocaching::app::events::TrackerEvent;
use radiocaching::app::payload::{PositionFix, TelemetryMessage};
use radiocaching::app::ports::LocationSource;
use radiocaching::app::service::TrackerService;
use radiocaching::config::{Backpressure, TrackerConfig};
use radiocaching::pipeline::{self, FixMailbox, Shutdown, WorkerReport};

use crate::mock_broker::MockConnector;
use crate::service_tests::{FixedClock, RecordingSink};

fn config(backpressure: Backpressure) -> TrackerConfig {
    let mut c = TrackerConfig::default();
    c.broker.connect_timeout_ms = 200;
    c.broker.ack_timeout_ms = 200;
    c.delivery.backpressure = backpressure;
    c.delivery.connect_on_start = false;
    c.location_interval_ms = 10_000;
    c
}

fn service(
    cfg: &TrackerConfig,
    broker: &MockConnector,
) -> TrackerService<MockConnector, FixedDoseRate, FixedClock> {
    TrackerService::new(cfg, broker.clone(), FixedDoseRate::default(), FixedClock(1))
}

fn published_latitudes(broker: &MockConnector) -> Vec<f64> {
    broker
        .log()
        .publishes()
        .iter()
        .map(|(_, body)| {
            serde_json::from_slice::<TelemetryMessage>(body)
                .unwrap()
                .latitude
        })
        .collect()
}

/// Post `fixes`, request shutdown, then run the worker to completion.
fn drain(backpressure: Backpressure, fixes: &[PositionFix]) -> (MockConnector, WorkerReport) {
    let broker = MockConnector::new();
    let cfg = config(backpressure);
    let mut svc = service(&cfg, &broker);
    let mailbox = FixMailbox::new(backpressure);
    let shutdown = Shutdown::new();

    for fix in fixes {
        mailbox.post(*fix);
    }
    shutdown.request();

    let report = block_on(pipeline::run(
        &mut svc,
        &mailbox,
        &shutdown,
        &mut RecordingSink::default(),
    ));
    (broker, report)
}

#[test]
fn latest_only_publishes_just_the_newest() {
    let (broker, report) = drain(
        Backpressure::LatestOnly,
        &[PositionFix::new(10.0, 0.0, 0), PositionFix::new(20.0, 0.0, 1)],
    );
    assert_eq!(published_latitudes(&broker), vec![20.0]);
    assert_eq!(report.superseded, 1);
    assert_eq!(report.delivered, 1);
}

#[test]
fn fifo_publishes_all_in_arrival_order() {
    let (broker, report) = drain(
        Backpressure::Fifo,
        &[PositionFix::new(10.0, 0.0, 0), PositionFix::new(20.0, 0.0, 1)],
    );
    assert_eq!(published_latitudes(&broker), vec![10.0, 20.0]);
    assert_eq!(report.superseded, 0);
    assert_eq!(report.handled, 2);
}

#[test]
fn fifo_overflow_keeps_newest_eight() {
    let fixes: Vec<_> = (0..10)
        .map(|n| PositionFix::new(f64::from(n), 0.0, i64::from(n)))
        .collect();
    let (broker, report) = drain(Backpressure::Fifo, &fixes);
    let expected: Vec<f64> = (2..10).map(f64::from).collect();
    assert_eq!(published_latitudes(&broker), expected);
    assert_eq!(report.superseded, 2);
}

#[test]
fn worker_disconnects_after_draining() {
    let (broker, _) = drain(Backpressure::Fifo, &[PositionFix::new(1.0, 1.0, 0)]);
    let log = broker.log();
    assert_eq!(log.publishes().len(), 1);
    assert_eq!(log.count_disconnects(), 1);
}

#[test]
fn idle_shutdown_sends_nothing() {
    let (broker, report) = drain(Backpressure::LatestOnly, &[]);
    assert_eq!(report, WorkerReport::default());
    assert!(broker.log().packets.is_empty());
}

#[test]
fn superseded_fixes_are_reported_as_events() {
    let broker = MockConnector::new();
    let cfg = config(Backpressure::LatestOnly);
    let mut svc = service(&cfg, &broker);
    let mailbox = FixMailbox::new(Backpressure::LatestOnly);
    let shutdown = Shutdown::new();
    let mut sink = RecordingSink::default();

    for n in 0..3 {
        mailbox.post(PositionFix::new(1.0, 1.0, n));
    }
    shutdown.request();
    block_on(pipeline::run(&mut svc, &mailbox, &shutdown, &mut sink));

    assert!(matches!(sink.events[0], TrackerEvent::FixesSuperseded(2)));
}

fn rmc(time: &str, lat: &str) -> String {
    let body = format!("GPRMC,{},A,{},N,01324.300,E,0.0,0.0,141123,,", time, lat);
    format!("${}*{:02X}\r\n", body, checksum(body.as_bytes()))
}

#[test]
fn nmea_stream_end_to_end_on_worker_thread() {
    let broker = MockConnector::new();
    let cfg = config(Backpressure::Fifo);
    let svc = service(&cfg, &broker);
    let board = StatusBoard::new(cfg.team_number, cfg.dose_rate_usv_h);
    let status = board.handle();

    let mailbox = Arc::new(FixMailbox::new(Backpressure::Fifo));
    let shutdown = Arc::new(Shutdown::new());
    let worker = pipeline::spawn(svc, Arc::clone(&mailbox), Arc::clone(&shutdown), board).unwrap();

    // 10 s throttle: 12:00:00, 12:00:10 and 12:00:20 pass, 12:00:05 does not.
    let input: String = [
        rmc("120000", "5230.000"),
        rmc("120005", "5231.000"),
        rmc("120010", "5232.000"),
        rmc("120020", "5233.000"),
    ]
    .concat();
    let fixes = NmeaLocationSource::new(input.as_bytes())
        .subscribe(cfg.location_interval_ms)
        .unwrap();
    assert_eq!(pipeline::pump(fixes, &mailbox, &shutdown), 3);

    shutdown.request();
    let report = worker.join().unwrap();

    assert_eq!(report.delivered, 3);
    let lats = published_latitudes(&broker);
    assert_eq!(lats.len(), 3);
    assert!((lats[2] - (52.0 + 33.0 / 60.0)).abs() < 1e-9);
    assert_eq!(broker.log().count_disconnects(), 1);

    let snap = status.snapshot();
    assert!(!snap.connected);
    assert_eq!(snap.coordinates_text(), "Lat: 52.55000, Lon: 13.40500");
    assert_eq!(snap.last_published_ms, Some(1));
}

#[test]
fn external_shutdown_stops_worker_while_input_is_blocked() {
    let broker = MockConnector::new();
    let cfg = config(Backpressure::LatestOnly);
    let svc = service(&cfg, &broker);
    let mailbox = Arc::new(FixMailbox::new(Backpressure::LatestOnly));
    let shutdown = Arc::new(Shutdown::new());
    let worker = pipeline::spawn(
        svc,
        Arc::clone(&mailbox),
        Arc::clone(&shutdown),
        RecordingSink::default(),
    )
    .unwrap();

    // A location source that yields one fix and then blocks on its next read.
    let (tx, rx) = mpsc::channel::<PositionFix>();
    let _pump = pipeline::spawn_pump(rx, Arc::clone(&mailbox), Arc::clone(&shutdown)).unwrap();
    tx.send(PositionFix::new(5.0, 5.0, 0)).unwrap();
    while broker.log().publishes().is_empty() {
        std::thread::sleep(Duration::from_millis(5));
    }

    // What the Ctrl-C handler does.
    shutdown.request();
    let report = worker.join().unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(broker.log().count_disconnects(), 1);
    drop(tx);
}
