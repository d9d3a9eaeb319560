//! MQTT 3.1.1 publish path.
//!
//! ```text
//!  payload ──▶ PublishChannel ──▶ packet codec ──▶ Transport (TLS/TCP) ──▶ broker
//! ```

pub mod channel;
pub mod packet;
pub mod topic;
pub mod transport;

pub use channel::{ChannelStats, ConnectionState, PublishChannel, SessionOptions};
pub use packet::QoS;
pub use transport::{Connector, Endpoint, Transport, TransportError};
