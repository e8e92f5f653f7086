//! Reconnect backoff+jitter
//!
//! Pure functions so the schedule is unit-testable without a clock or a
//! socket.

use rand::Rng;
use std::time::Duration;

use crate::config::TransportConfig;

/// `min(delay * backoff_factor, max_delay)`, then jittered by a uniform
/// factor in `[1 - jitter_fraction, 1 + jitter_fraction]`.
pub fn next_delay(current: Duration, config: &TransportConfig) -> Duration {
    let grown = current.mul_f64(config.backoff_factor);
    let bounded = grown.min(config.reconnect_max_delay());
    jitter(bounded, config.jitter_fraction)
}

fn jitter(delay: Duration, jitter_fraction: f64) -> Duration {
    if jitter_fraction == 0.0 {
        return delay;
    }
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range((1.0 - jitter_fraction)..=(1.0 + jitter_fraction));
    delay.mul_f64(factor.max(0.0))
}
