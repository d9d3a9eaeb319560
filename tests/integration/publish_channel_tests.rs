//! PublishChannel integration tests.
//!
//! Exercise the connection state machine against the scripted mock broker:
//! lazy connect, idempotent `ensure_connected`, PUBACK matching, session
//! teardown on failure, keep-alive pings and orderly shutdown.

use std::time::Duration;

use radiocaching::error::{ConnectError, PublishError};
use radiocaching::mqtt::packet::ConnackCode;
use radiocaching::mqtt::topic::{client_id, coordinates_topic};
use radiocaching::mqtt::{ConnectionState, Endpoint, PublishChannel, QoS, SessionOptions};

use crate::mock_broker::{MockConnector, Recorded, Script};

fn options() -> SessionOptions {
    SessionOptions {
        client_id: client_id("radiocaching", 1, 1_700_000_000_000),
        keep_alive_secs: 60,
        connect_timeout: Duration::from_millis(50),
        ack_timeout: Duration::from_millis(50),
        username: None,
        password: None,
    }
}

fn channel(broker: &MockConnector) -> PublishChannel<MockConnector> {
    channel_with(broker, options())
}

fn channel_with(broker: &MockConnector, options: SessionOptions) -> PublishChannel<MockConnector> {
    let endpoint = Endpoint {
        host: "broker.test".into(),
        port: 8883,
        connect_timeout: Duration::from_millis(50),
    };
    PublishChannel::new(broker.clone(), endpoint, options)
}

#[test]
fn ensure_connected_twice_handshakes_once() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    assert_eq!(ch.state(), ConnectionState::Disconnected);

    ch.ensure_connected().unwrap();
    ch.ensure_connected().unwrap();

    assert_eq!(ch.state(), ConnectionState::Connected);
    assert_eq!(ch.stats().handshakes, 1);
    assert_eq!(broker.log().connect_attempts, 1);
    assert_eq!(
        broker.log().packets[0],
        Recorded::Connect {
            client_id: "radiocaching-t1-1700000000000".into(),
            username: None,
        }
    );
}

#[test]
fn publish_while_disconnected_connects_first() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    let topic = coordinates_topic(1);

    ch.publish(&topic, br#"{"x":1}"#, QoS::AtLeastOnce).unwrap();

    let log = broker.log();
    assert_eq!(log.connect_attempts, 1);
    assert!(matches!(log.packets[0], Recorded::Connect { .. }));
    assert_eq!(
        log.packets[1],
        Recorded::Publish {
            topic: "radiocaching/ff/search_teams/1/coordinates".into(),
            qos: 1,
            packet_id: Some(1),
            payload: br#"{"x":1}"#.to_vec(),
        }
    );
    drop(log);
    assert_eq!(ch.stats().published, 1);
}

#[test]
fn consecutive_publishes_reuse_session_and_number_packets() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    for _ in 0..3 {
        ch.publish("a/b", b"x", QoS::AtLeastOnce).unwrap();
    }
    let ids: Vec<_> = broker
        .log()
        .packets
        .iter()
        .filter_map(|p| match p {
            Recorded::Publish { packet_id, .. } => *packet_id,
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(broker.log().connect_attempts, 1);
}

#[test]
fn shutdown_while_disconnected_is_noop() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    assert!(ch.shutdown().is_ok());
    assert!(broker.log().packets.is_empty());
    assert_eq!(broker.log().connect_attempts, 0);
}

#[test]
fn shutdown_sends_disconnect_and_closes() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    ch.ensure_connected().unwrap();
    ch.shutdown().unwrap();

    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert_eq!(broker.log().count_disconnects(), 1);
    assert_eq!(broker.log().closes, 1);
}

#[test]
fn refused_handshake_stays_disconnected() {
    let broker = MockConnector::with_script(Script {
        connack_code: 5,
        ..Script::default()
    });
    let mut ch = channel(&broker);

    assert_eq!(
        ch.ensure_connected(),
        Err(ConnectError::Refused(ConnackCode::NotAuthorized))
    );
    assert_eq!(ch.state(), ConnectionState::Disconnected);

    assert_eq!(
        ch.publish("a/b", b"x", QoS::AtLeastOnce),
        Err(PublishError::Connect(ConnectError::Refused(
            ConnackCode::NotAuthorized
        )))
    );
    assert_eq!(ch.state(), ConnectionState::Disconnected);
    assert_eq!(broker.log().closes, 2);
    assert_eq!(ch.stats().failed, 1);
}

#[test]
fn transport_failure_is_connect_error() {
    let broker = MockConnector::with_script(Script {
        connect_error: Some(ConnectError::Tls),
        ..Script::default()
    });
    let mut ch = channel(&broker);
    assert_eq!(
        ch.publish("a/b", b"x", QoS::AtLeastOnce),
        Err(PublishError::Connect(ConnectError::Tls))
    );
    assert!(broker.log().packets.is_empty());
}

#[test]
fn missing_connack_times_out() {
    let broker = MockConnector::with_script(Script {
        answer_connect: false,
        ..Script::default()
    });
    let mut ch = channel(&broker);
    assert_eq!(ch.ensure_connected(), Err(ConnectError::Timeout));
    assert_eq!(ch.state(), ConnectionState::Disconnected);
}

#[test]
fn missing_puback_drops_session_and_next_publish_reconnects() {
    let broker = MockConnector::with_script(Script {
        ack_publishes: false,
        ..Script::default()
    });
    let mut ch = channel(&broker);

    assert_eq!(
        ch.publish("a/b", b"x", QoS::AtLeastOnce),
        Err(PublishError::Timeout)
    );
    assert_eq!(ch.state(), ConnectionState::Disconnected);

    broker.set_script(Script::default());
    ch.publish("a/b", b"y", QoS::AtLeastOnce).unwrap();
    assert_eq!(broker.log().connect_attempts, 2);
    assert_eq!(broker.log().count_connects(), 2);
}

#[test]
fn stale_puback_is_ignored() {
    let broker = MockConnector::with_script(Script {
        stale_ack_first: Some(999),
        ..Script::default()
    });
    let mut ch = channel(&broker);
    ch.publish("a/b", b"x", QoS::AtLeastOnce).unwrap();
    assert_eq!(ch.state(), ConnectionState::Connected);
}

#[test]
fn invalid_topic_rejected_without_network() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    for topic in ["", "a/+/b", "a/#"] {
        assert_eq!(
            ch.publish(topic, b"x", QoS::AtLeastOnce),
            Err(PublishError::InvalidTopic)
        );
    }
    assert_eq!(broker.log().connect_attempts, 0);
}

#[test]
fn publish_after_shutdown_reconnects_lazily() {
    let broker = MockConnector::new();
    let mut ch = channel(&broker);
    ch.ensure_connected().unwrap();
    ch.shutdown().unwrap();
    assert_eq!(ch.state(), ConnectionState::Disconnected);

    ch.publish("a/b", b"x", QoS::AtLeastOnce).unwrap();

    assert_eq!(ch.state(), ConnectionState::Connected);
    assert_eq!(broker.log().connect_attempts, 2);
    assert_eq!(broker.log().publishes().len(), 1);
}

fn short_keep_alive() -> SessionOptions {
    SessionOptions {
        keep_alive_secs: 1,
        ..options()
    }
}

#[test]
fn answered_ping_keeps_idle_session() {
    let broker = MockConnector::new();
    let mut ch = channel_with(&broker, short_keep_alive());
    ch.publish("a/b", b"x", QoS::AtLeastOnce).unwrap();

    std::thread::sleep(Duration::from_millis(1100));
    ch.publish("a/b", b"y", QoS::AtLeastOnce).unwrap();

    let log = broker.log();
    assert_eq!(log.count_pings(), 1);
    assert_eq!(log.connect_attempts, 1);
    assert_eq!(log.publishes().len(), 2);
}

#[test]
fn unanswered_ping_reconnects_before_publish() {
    let broker = MockConnector::with_script(Script {
        answer_ping: false,
        ..Script::default()
    });
    let mut ch = channel_with(&broker, short_keep_alive());
    ch.publish("a/b", b"x", QoS::AtLeastOnce).unwrap();

    std::thread::sleep(Duration::from_millis(1100));
    ch.publish("a/b", b"y", QoS::AtLeastOnce).unwrap();

    let log = broker.log();
    assert_eq!(log.count_pings(), 1);
    assert_eq!(log.connect_attempts, 2);
    assert_eq!(log.closes, 1);
    assert_eq!(log.publishes().len(), 2);
    drop(log);
    assert_eq!(ch.stats().failed, 0);
}

#[test]
fn busy_session_is_not_pinged() {
    let broker = MockConnector::new();
    let mut ch = channel_with(&broker, short_keep_alive());
    for _ in 0..3 {
        ch.publish("a/b", b"x", QoS::AtLeastOnce).unwrap();
        std::thread::sleep(Duration::from_millis(400));
    }
    assert_eq!(broker.log().count_pings(), 0);
}

#[test]
fn dropping_connected_channel_disconnects() {
    let broker = MockConnector::new();
    {
        let mut ch = channel(&broker);
        ch.ensure_connected().unwrap();
    }
    assert_eq!(broker.log().count_disconnects(), 1);
}

#[test]
fn dropping_disconnected_channel_sends_nothing() {
    let broker = MockConnector::new();
    drop(channel(&broker));
    assert!(broker.log().packets.is_empty());
}

#[test]
fn credentials_are_sent_in_connect() {
    let broker = MockConnector::new();
    let mut opts = options();
    opts.username = Some("team1".into());
    opts.password = Some("secret".into());
    let mut ch = channel_with(&broker, opts);
    ch.ensure_connected().unwrap();
    assert!(matches!(
        &broker.log().packets[0],
        Recorded::Connect { username: Some(u), .. } if u == "team1"
    ));
}
