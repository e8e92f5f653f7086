//! Dispatcher (Bounded SPSC Queue)
//!
//! Decouples the IO-driven producer from the consumer. Guarantees that a
//! slow consumer never blocks the IO path by dropping the oldest queued
//! event on overflow, and surfaces drop pressure as an EMA-smoothed health
//! signal.
//!
//! Single-producer, single-consumer by contract: the ring and its four
//! counters share one `parking_lot::Mutex`, per the rule that a queue
//! implementation without proven lock-free SPSC primitives must cover the
//! ring and its counters with a single mutex rather than exposing counters
//! without it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::DispatcherConfig;
use crate::event::Event;

#[derive(Debug, Clone, PartialEq)]
pub enum DispatcherError {
    InvalidArgument(String),
}

impl fmt::Display for DispatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for DispatcherError {}

/// Frozen read-only counters snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherStats {
    pub total_pushed: u64,
    pub total_polled: u64,
    pub total_dropped: u64,
    pub queue_len: usize,
    pub maxlen: usize,
}

/// Frozen read-only health snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherHealth {
    pub drop_rate_ema: f64,
    pub utilization: f64,
    pub queue_len: usize,
    pub maxlen: usize,
}

struct Inner {
    ring: VecDeque<Event>,
    total_pushed: u64,
    total_polled: u64,
    total_dropped: u64,
    drop_rate_ema: f64,
}

/// Bounded FIFO with drop-oldest overflow and exact drop accounting.
pub struct Dispatcher {
    config: DispatcherConfig,
    inner: Mutex<Inner>,
    /// Tracks whether the drop-rate EMA is currently above the warning
    /// threshold, so the warn/recovery log lines are edge-triggered.
    above_threshold: AtomicBool,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let maxlen = config.maxlen;
        Self {
            config,
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(maxlen),
                total_pushed: 0,
                total_polled: 0,
                total_dropped: 0,
                drop_rate_ema: 0.0,
            }),
            above_threshold: AtomicBool::new(false),
        }
    }

    /// Producer-only. Appends `event`, evicting the oldest element when at
    /// capacity.
    pub fn push(&self, event: Event) {
        let mut inner = self.inner.lock();

        let dropped = if inner.ring.len() == self.config.maxlen {
            inner.ring.pop_front();
            inner.total_dropped += 1;
            true
        } else {
            false
        };

        inner.ring.push_back(event);
        inner.total_pushed += 1;

        let alpha = self.config.ema_alpha;
        let sample = if dropped { 1.0 } else { 0.0 };
        inner.drop_rate_ema = alpha * sample + (1.0 - alpha) * inner.drop_rate_ema;
        let ema = inner.drop_rate_ema;

        drop(inner);
        self.update_warning_edge(ema);
    }

    fn update_warning_edge(&self, ema: f64) {
        let now_above = ema > self.config.drop_warning_threshold;
        let was_above = self.above_threshold.swap(now_above, Ordering::Relaxed);
        if now_above && !was_above {
            warn!(drop_rate_ema = ema, "dispatcher drop rate crossed threshold");
        } else if !now_above && was_above {
            info!(drop_rate_ema = ema, "dispatcher drop rate recovered");
        }
    }

    /// Consumer-only. Removes up to `min(max_events, queue_len)` elements
    /// from the front in FIFO order.
    pub fn poll(&self, max_events: usize) -> Result<Vec<Event>, DispatcherError> {
        if max_events == 0 {
            return Err(DispatcherError::InvalidArgument(
                "max_events must be greater than 0".into(),
            ));
        }

        let mut inner = self.inner.lock();
        let count = max_events.min(inner.ring.len());
        let drained: Vec<Event> = inner.ring.drain(..count).collect();
        inner.total_polled += drained.len() as u64;
        Ok(drained)
    }

    /// Lifecycle only: must not overlap with `push`/`poll`.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.ring.clear();
        inner.total_pushed = 0;
        inner.total_polled = 0;
        inner.total_dropped = 0;
        inner.drop_rate_ema = 0.0;
        self.above_threshold.store(false, Ordering::Relaxed);
    }

    pub fn stats(&self) -> DispatcherStats {
        let inner = self.inner.lock();
        DispatcherStats {
            total_pushed: inner.total_pushed,
            total_polled: inner.total_polled,
            total_dropped: inner.total_dropped,
            queue_len: inner.ring.len(),
            maxlen: self.config.maxlen,
        }
    }

    pub fn health(&self) -> DispatcherHealth {
        let inner = self.inner.lock();
        DispatcherHealth {
            drop_rate_ema: inner.drop_rate_ema,
            utilization: inner.ring.len() as f64 / self.config.maxlen as f64,
            queue_len: inner.ring.len(),
            maxlen: self.config.maxlen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BestBidAsk, SessionFlag};

    fn event(symbol: &str) -> Event {
        Event::BestBidAsk(BestBidAsk {
            symbol: symbol.to_string(),
            bid: 1.0,
            ask: 1.1,
            bid_vol: 1,
            ask_vol: 1,
            bid_flag: SessionFlag::Normal,
            ask_flag: SessionFlag::Normal,
            recv_ts: 0,
            recv_mono_ns: 0,
            connection_epoch: 0,
        })
    }

    fn assert_accounting_invariant(d: &Dispatcher) {
        let stats = d.stats();
        assert_eq!(
            stats.total_pushed - stats.total_dropped - stats.total_polled,
            stats.queue_len as u64
        );
        assert!(stats.queue_len <= stats.maxlen);
    }

    #[test]
    fn scenario_s1_drop_oldest_then_poll() {
        let d = Dispatcher::new(DispatcherConfig {
            maxlen: 3,
            ..Default::default()
        });
        for s in ["A", "B", "C", "D", "E"] {
            d.push(event(s));
        }
        let stats = d.stats();
        assert_eq!(stats.total_pushed, 5);
        assert_eq!(stats.total_dropped, 2);
        assert_eq!(stats.total_polled, 0);
        assert_eq!(stats.queue_len, 3);
        assert_accounting_invariant(&d);

        let polled = d.poll(2).unwrap();
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].symbol(), "C");
        assert_eq!(polled[1].symbol(), "D");

        let stats = d.stats();
        assert_eq!(stats.total_polled, 2);
        assert_eq!(stats.queue_len, 1);
        assert_accounting_invariant(&d);
    }

    #[test]
    fn scenario_s2_maxlen_one() {
        let d = Dispatcher::new(DispatcherConfig {
            maxlen: 1,
            ..Default::default()
        });
        d.push(event("A"));
        d.push(event("B"));
        d.push(event("C"));
        let stats = d.stats();
        assert_eq!(stats.total_dropped, 2);
        assert_eq!(stats.queue_len, 1);
        let polled = d.poll(1).unwrap();
        assert_eq!(polled[0].symbol(), "C");
    }

    #[test]
    fn poll_rejects_non_positive_max_events() {
        let d = Dispatcher::new(DispatcherConfig::default());
        d.push(event("A"));
        assert!(matches!(
            d.poll(0),
            Err(DispatcherError::InvalidArgument(_))
        ));
    }

    #[test]
    fn round_trip_when_capacity_exceeds_count() {
        let d = Dispatcher::new(DispatcherConfig {
            maxlen: 10,
            ..Default::default()
        });
        for s in ["A", "B", "C"] {
            d.push(event(s));
        }
        let polled = d.poll(3).unwrap();
        let symbols: Vec<&str> = polled.iter().map(|e| e.symbol()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
    }

    #[test]
    fn ema_stays_zero_with_no_drops() {
        let d = Dispatcher::new(DispatcherConfig {
            maxlen: 100,
            ..Default::default()
        });
        for i in 0..50 {
            d.push(event(&format!("S{i}")));
        }
        assert_eq!(d.health().drop_rate_ema, 0.0);
    }

    #[test]
    fn ema_bounds_hold_under_mixed_operations() {
        let d = Dispatcher::new(DispatcherConfig {
            maxlen: 2,
            ema_alpha: 0.3,
            ..Default::default()
        });
        for i in 0..200 {
            d.push(event(&format!("S{i}")));
            if i % 3 == 0 {
                let _ = d.poll(1);
            }
            let ema = d.health().drop_rate_ema;
            assert!((0.0..=1.0).contains(&ema));
            assert_accounting_invariant(&d);
        }
    }

    #[test]
    fn clear_resets_counters_and_ema() {
        let d = Dispatcher::new(DispatcherConfig {
            maxlen: 1,
            ..Default::default()
        });
        d.push(event("A"));
        d.push(event("B"));
        d.clear();
        let stats = d.stats();
        assert_eq!(stats.total_pushed, 0);
        assert_eq!(stats.total_dropped, 0);
        assert_eq!(stats.total_polled, 0);
        assert_eq!(stats.queue_len, 0);
        assert_eq!(d.health().drop_rate_ema, 0.0);
    }
}
