//! Client-side TLS configuration
//!
//! Builds a `rustls::ClientConfig` trusting the host's native root store.
//! There is no server-side verification to configure here (unlike the
//! broker's `TlsAcceptor`); a client only needs a root store and SNI.

use std::sync::Arc;

use tokio_rustls::rustls::{ClientConfig, RootCertStore};

#[derive(Debug)]
pub enum TlsError {
    Io(std::io::Error),
    ConfigError(String),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::Io(e) => write!(f, "IO error: {}", e),
            TlsError::ConfigError(msg) => write!(f, "TLS config error: {}", msg),
        }
    }
}

impl std::error::Error for TlsError {}

impl From<std::io::Error> for TlsError {
    fn from(e: std::io::Error) -> Self {
        TlsError::Io(e)
    }
}

/// Build a `ClientConfig` trusting the platform's native CA roots.
pub fn load_client_config() -> Result<Arc<ClientConfig>, TlsError> {
    let mut root_store = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    for err in &native_certs.errors {
        tracing::warn!(error = %err, "skipping unreadable native certificate");
    }
    if native_certs.certs.is_empty() {
        return Err(TlsError::ConfigError(
            "no native root certificates available".to_string(),
        ));
    }
    for cert in native_certs.certs {
        root_store
            .add(cert)
            .map_err(|e| TlsError::ConfigError(format!("failed to add root certificate: {}", e)))?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(config))
}
