//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `dose_rate`    | DoseRateSource     | Configured constant          |
//! | `log_sink`     | EventSink          | `log` facade / stderr        |
//! | `nmea`         | LocationSource     | NMEA 0183 stream (GPS, file) |
//! | `status`       | EventSink          | Operator status board        |
//! | `time`         | Clock              | Host system clock            |
//! | `tls_transport`| Connector          | TCP + TLS (rustls) / TCP     |

pub mod dose_rate;
pub mod log_sink;
pub mod nmea;
pub mod status;
pub mod time;
pub mod tls_transport;
