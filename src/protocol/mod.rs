//! MQTT 3.1.1 protocol types, trimmed to the QoS-0 packet set this crate
//! exchanges with a broker-hosted feed.

mod error;
mod packet;

pub use error::{DecodeError, EncodeError, ProtocolError};
pub use packet::*;
