//! Location-to-publish pipeline.
//!
//! - [`mailbox`]: non-blocking hand-off of fixes plus the shutdown flag.
//! - [`worker`]: the publish loop and the location pump.

pub mod mailbox;
pub mod worker;

pub use mailbox::{FixMailbox, Shutdown, FIFO_DEPTH};
pub use worker::{pump, run, spawn, spawn_pump, WorkerReport};
