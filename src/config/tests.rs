//! Config module tests

use super::*;

#[test]
fn test_default_dispatcher_config_is_valid() {
    let config = DispatcherConfig::default();
    assert_eq!(config.maxlen, 100_000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_dispatcher_config_rejects_zero_maxlen() {
    let config = DispatcherConfig {
        maxlen: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_dispatcher_config_rejects_out_of_range_alpha() {
    let config = DispatcherConfig {
        ema_alpha: 0.0,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = DispatcherConfig {
        ema_alpha: 1.5,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_default_transport_config_is_valid() {
    let config = TransportConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.reconnect_min_delay(), Duration::from_secs(1));
    assert_eq!(config.reconnect_max_delay(), Duration::from_secs(30));
}

#[test]
fn test_transport_config_rejects_max_below_min() {
    let config = TransportConfig {
        reconnect_min_delay: Duration::from_secs(10),
        reconnect_max_delay: Duration::from_secs(5),
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_transport_config_rejects_zero_min_delay() {
    let config = TransportConfig {
        reconnect_min_delay: Duration::from_secs(0),
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_default_liveness_config_is_valid() {
    let config = LivenessConfig::default();
    assert_eq!(config.max_gap_seconds, 5.0);
    assert!(config.per_symbol_max_gap.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_liveness_config_rejects_non_positive_gap() {
    let config = LivenessConfig {
        max_gap_seconds: 0.0,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_liveness_config_rejects_bad_per_symbol_override() {
    let mut overrides = HashMap::new();
    overrides.insert("PTT".to_string(), -1.0);
    let config = LivenessConfig {
        per_symbol_max_gap: overrides,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_normalizer_config_default_is_not_full_depth() {
    let config = NormalizerConfig::default();
    assert!(!config.full_depth);
    assert!(config.validate().is_ok());
}
