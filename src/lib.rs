//! Radiocaching tracker library.
//!
//! Publishes the position of a radiation-reconnaissance search team, paired
//! with the current dose rate, to an MQTT broker over TLS.
//!
//! ```text
//! LocationSource ──▶ FixMailbox ──▶ publish worker ──▶ TrackerService
//!  (NMEA reader)     (pipeline)      (own thread)      (payload build)
//!                                                            │
//!                                          broker ◀── PublishChannel
//!                                                      (MQTT 3.1.1)
//! ```
//!
//! The binary in `main.rs` wires the concrete adapters; everything here is
//! exposed for the integration tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod mqtt;
pub mod pipeline;

pub use error::{Error, Result};
