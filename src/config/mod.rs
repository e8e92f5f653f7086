//! Configuration Module
//!
//! Value types for the four core components. Each config is validated at
//! construction and then immutable for the lifetime of its owner. There is
//! no file or CLI loading path here; callers build these programmatically.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Configuration error types
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A field failed validation
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Validation(msg) => write!(f, "validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn default_dispatcher_maxlen() -> usize {
    100_000
}

fn default_ema_alpha() -> f64 {
    0.01
}

fn default_drop_warning_threshold() -> f64 {
    0.01
}

/// Dispatcher (bounded SPSC queue) configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub maxlen: usize,
    pub ema_alpha: f64,
    pub drop_warning_threshold: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            maxlen: default_dispatcher_maxlen(),
            ema_alpha: default_ema_alpha(),
            drop_warning_threshold: default_drop_warning_threshold(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maxlen == 0 {
            return Err(ConfigError::Validation(
                "maxlen must be greater than 0".into(),
            ));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ConfigError::Validation(
                "ema_alpha must be in (0, 1]".into(),
            ));
        }
        if !(self.drop_warning_threshold > 0.0 && self.drop_warning_threshold <= 1.0) {
            return Err(ConfigError::Validation(
                "drop_warning_threshold must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn default_reconnect_min_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_reconnect_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_token_refresh_lead_time() -> Duration {
    Duration::from_secs(100)
}

fn default_keepalive() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter_fraction() -> f64 {
    0.2
}

/// Transport controller configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub reconnect_min_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub token_refresh_lead_time: Duration,
    pub keepalive: Duration,
    pub backoff_factor: f64,
    pub jitter_fraction: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_min_delay: default_reconnect_min_delay(),
            reconnect_max_delay: default_reconnect_max_delay(),
            token_refresh_lead_time: default_token_refresh_lead_time(),
            keepalive: default_keepalive(),
            backoff_factor: default_backoff_factor(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect_min_delay.is_zero() {
            return Err(ConfigError::Validation(
                "reconnect_min_delay must be greater than 0".into(),
            ));
        }
        if self.reconnect_max_delay < self.reconnect_min_delay {
            return Err(ConfigError::Validation(
                "reconnect_max_delay must be >= reconnect_min_delay".into(),
            ));
        }
        if self.backoff_factor <= 1.0 {
            return Err(ConfigError::Validation(
                "backoff_factor must be greater than 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(ConfigError::Validation(
                "jitter_fraction must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_min_delay(&self) -> Duration {
        self.reconnect_min_delay
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        self.reconnect_max_delay
    }
}

/// Normalizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizerConfig {
    /// Build fixed-length 10-tuple `FullBidOffer` events instead of `BestBidAsk`.
    pub full_depth: bool,
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

fn default_max_gap_seconds() -> f64 {
    5.0
}

/// Liveness monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessConfig {
    pub max_gap_seconds: f64,
    pub per_symbol_max_gap: HashMap<String, f64>,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            max_gap_seconds: default_max_gap_seconds(),
            per_symbol_max_gap: HashMap::new(),
        }
    }
}

impl LivenessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_gap_seconds <= 0.0 {
            return Err(ConfigError::Validation(
                "max_gap_seconds must be greater than 0".into(),
            ));
        }
        for (symbol, gap) in &self.per_symbol_max_gap {
            if *gap <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "per_symbol_max_gap[{}] must be greater than 0",
                    symbol
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
