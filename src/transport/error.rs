//! Transport controller error types

use std::fmt;

use crate::protocol::{DecodeError, EncodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// `connect()` called from a state other than INIT
    InvalidState(&'static str),
    /// Initial authentication failed; state stays INIT
    Unauthenticated(String),
    /// Lower-level wire or network failure, not raised out — retried by
    /// the reconnect worker
    TransientNetwork(String),
    /// Consumer-supplied callback panicked while handling an inbound message
    CallbackFailure,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Self::Unauthenticated(msg) => write!(f, "unauthenticated: {}", msg),
            Self::TransientNetwork(msg) => write!(f, "transient network error: {}", msg),
            Self::CallbackFailure => write!(f, "consumer callback failed"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<DecodeError> for TransportError {
    fn from(e: DecodeError) -> Self {
        TransportError::TransientNetwork(e.to_string())
    }
}

impl From<EncodeError> for TransportError {
    fn from(e: EncodeError) -> Self {
        TransportError::TransientNetwork(e.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::TransientNetwork(e.to_string())
    }
}
