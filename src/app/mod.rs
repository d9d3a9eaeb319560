//! Application core: payload building and publish orchestration.
//!
//! All interaction with the GPS receiver, the dose-rate probe, the clock
//! and the operator display happens through **port traits** defined in
//! [`ports`], keeping this layer testable without devices or a broker.

pub mod events;
pub mod payload;
pub mod ports;
pub mod service;
