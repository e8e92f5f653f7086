//! Auth collaborator
//!
//! Injected at construction; no concrete backend ships in this crate.
//! Mirrors the teacher's single-method async collaborator traits
//! (`RemotePeer`, `AuthProvider`) rather than a config-file-driven backend.

use std::fmt;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    Rejected(String),
    Unavailable(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "auth rejected: {}", msg),
            Self::Unavailable(msg) => write!(f, "auth backend unavailable: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Resolved connection target: WebSocket+TLS host, bearer token, and the
/// wall-clock nanosecond timestamp at which the token expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostToken {
    pub host: String,
    pub token: String,
    pub expiry_wall_clock_ns: u64,
}

/// Called on every connect and reconnect attempt.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn fetch_host_token(&self) -> Result<HostToken, AuthError>;
}
