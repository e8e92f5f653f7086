//! Liveness Monitor
//!
//! Detects feed silence globally and per-symbol using a monotonic clock.
//! Intended for single-threaded, consumer-side use; concurrent access
//! requires external synchronization.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::LivenessConfig;

/// Global and per-symbol staleness tracker.
pub struct LivenessMonitor {
    config: LivenessConfig,
    global_last_ns: Option<u64>,
    per_symbol_last_ns: HashMap<String, u64>,
}

impl LivenessMonitor {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            global_last_ns: None,
            per_symbol_last_ns: HashMap::new(),
        }
    }

    /// Record an observation for `symbol` at `now_ns`.
    pub fn on_event(&mut self, symbol: &str, now_ns: u64) {
        let symbol = symbol.to_uppercase();
        self.global_last_ns = Some(now_ns);
        self.per_symbol_last_ns.insert(symbol, now_ns);
    }

    /// False until the first event has ever been recorded.
    pub fn is_feed_dead(&self, now_ns: u64) -> bool {
        match self.global_last_ns {
            None => false,
            Some(last) => gap_ns(now_ns, last) > seconds_to_ns(self.config.max_gap_seconds),
        }
    }

    /// False if the symbol has never been seen.
    pub fn is_stale(&self, symbol: &str, now_ns: u64) -> bool {
        let symbol = symbol.to_uppercase();
        match self.per_symbol_last_ns.get(&symbol) {
            None => false,
            Some(&last) => gap_ns(now_ns, last) > seconds_to_ns(self.gap_seconds(&symbol)),
        }
    }

    /// All currently tracked symbols whose gap exceeds their threshold.
    pub fn stale_symbols(&self, now_ns: u64) -> Vec<String> {
        self.per_symbol_last_ns
            .iter()
            .filter(|(symbol, &last)| {
                gap_ns(now_ns, last) > seconds_to_ns(self.gap_seconds(symbol))
            })
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    pub fn has_ever_received(&self) -> bool {
        self.global_last_ns.is_some()
    }

    pub fn has_seen(&self, symbol: &str) -> bool {
        self.per_symbol_last_ns
            .contains_key(&symbol.to_uppercase())
    }

    pub fn tracked_symbol_count(&self) -> usize {
        self.per_symbol_last_ns.len()
    }

    /// Remove the per-symbol entry; does not alter the global timestamp.
    /// Returns whether the symbol was tracked.
    pub fn purge(&mut self, symbol: &str) -> bool {
        self.per_symbol_last_ns
            .remove(&symbol.to_uppercase())
            .is_some()
    }

    /// Clear global timestamp and all per-symbol state.
    pub fn reset(&mut self) {
        self.global_last_ns = None;
        self.per_symbol_last_ns.clear();
    }

    fn gap_seconds(&self, symbol: &str) -> f64 {
        self.config
            .per_symbol_max_gap
            .get(symbol)
            .copied()
            .unwrap_or(self.config.max_gap_seconds)
    }
}

fn gap_ns(now_ns: u64, last_ns: u64) -> u64 {
    now_ns.saturating_sub(last_ns)
}

fn seconds_to_ns(seconds: f64) -> u64 {
    Duration::from_secs_f64(seconds).as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor_with_gap(seconds: f64) -> LivenessMonitor {
        LivenessMonitor::new(LivenessConfig {
            max_gap_seconds: seconds,
            ..Default::default()
        })
    }

    #[test]
    fn startup_awareness_before_any_event() {
        let monitor = monitor_with_gap(5.0);
        assert!(!monitor.is_feed_dead(1_000_000_000));
        assert!(!monitor.has_ever_received());
    }

    #[test]
    fn strict_boundary_gap_equal_to_threshold_is_not_dead() {
        let mut monitor = monitor_with_gap(5.0);
        monitor.on_event("PTT", 0);
        assert!(!monitor.is_feed_dead(5_000_000_000));
        assert!(monitor.is_feed_dead(5_000_000_001));
    }

    #[test]
    fn negative_delta_clamps_to_not_dead() {
        let mut monitor = monitor_with_gap(5.0);
        monitor.on_event("PTT", 10_000_000_000);
        assert!(!monitor.is_feed_dead(0));
    }

    #[test]
    fn scenario_s7_liveness() {
        let mut monitor = monitor_with_gap(5.0);
        monitor.on_event("PTT", 0);
        assert!(!monitor.is_feed_dead(5_000_000_000));
        assert!(monitor.is_feed_dead(6_000_000_000));
        monitor.on_event("PTT", 6_000_000_000);
        assert!(!monitor.is_feed_dead(6_000_000_000 + 1_000));
    }

    #[test]
    fn per_symbol_override_takes_precedence() {
        let mut config = LivenessConfig {
            max_gap_seconds: 5.0,
            ..Default::default()
        };
        config.per_symbol_max_gap.insert("PTT".to_string(), 10.0);
        let mut monitor = LivenessMonitor::new(config);
        monitor.on_event("ptt", 0);
        // 6s gap: below the per-symbol 10s threshold, so not stale.
        assert!(!monitor.is_stale("PTT", 6_000_000_000));
        assert!(monitor.is_stale("PTT", 11_000_000_000));
    }

    #[test]
    fn purge_removes_symbol_without_touching_global() {
        let mut monitor = monitor_with_gap(5.0);
        monitor.on_event("PTT", 0);
        assert!(monitor.purge("ptt"));
        assert!(!monitor.has_seen("PTT"));
        assert!(monitor.has_ever_received());
        assert!(!monitor.purge("PTT"));
    }

    #[test]
    fn reset_clears_everything() {
        let mut monitor = monitor_with_gap(5.0);
        monitor.on_event("PTT", 0);
        monitor.reset();
        assert!(!monitor.has_ever_received());
        assert_eq!(monitor.tracked_symbol_count(), 0);
    }

    #[test]
    fn stale_symbols_lists_only_symbols_past_threshold() {
        let mut monitor = monitor_with_gap(5.0);
        monitor.on_event("AOT", 0);
        monitor.on_event("PTT", 4_000_000_000);
        let stale = monitor.stale_symbols(6_000_000_000);
        assert_eq!(stale, vec!["AOT".to_string()]);
    }
}
