//! Normalizer (Hot Path)
//!
//! Turns a raw `(topic, payload)` pair into an immutable `Event` and hands
//! it to a single consumer callback. Two isolated phases, each with its own
//! counter and independently rate-limited logging: PARSE (protobuf decode +
//! field extraction) and CALLBACK (consumer invocation).

mod proto;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use prost::Message;
use tracing::{error, info, warn};

use crate::config::NormalizerConfig;
use crate::event::{BestBidAsk, Event, FullBidOffer};

use proto::{money_to_f64, session_flag_from_i32, BidOfferV3};

/// How many initial occurrences of an error class get full-detail logging.
const LOG_DETAIL_COUNT: u64 = 10;
/// After the detail window, log every Nth occurrence at summary level.
const LOG_SUMMARY_EVERY: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizerStats {
    pub messages_parsed: u64,
    pub parse_errors: u64,
    pub callback_errors: u64,
}

type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// Two-phase decode-and-dispatch hot path.
pub struct Normalizer {
    config: NormalizerConfig,
    on_event: EventCallback,
    mono_origin: Instant,
    messages_parsed: AtomicU64,
    parse_errors: AtomicU64,
    callback_errors: AtomicU64,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig, on_event: EventCallback) -> Self {
        Self {
            config,
            on_event,
            mono_origin: Instant::now(),
            messages_parsed: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            callback_errors: AtomicU64::new(0),
        }
    }

    /// Decode `payload`, build an event, and invoke the consumer callback.
    /// `topic` is used only for diagnostics; the symbol comes from the
    /// decoded payload itself. Exactly one of the three counters advances
    /// per call.
    pub fn on_message(&self, topic: &str, payload: &[u8], connection_epoch: u64) {
        let recv_ts = wall_clock_nanos();
        let recv_mono_ns = self.mono_origin.elapsed().as_nanos() as u64;

        let event = match self.decode(payload, recv_ts, recv_mono_ns, connection_epoch) {
            Ok(event) => event,
            Err(err) => {
                self.record_parse_error(topic, &err);
                return;
            }
        };

        let callback = self.on_event.clone();
        let result = catch_unwind(AssertUnwindSafe(|| (callback)(event)));
        if result.is_err() {
            self.record_callback_error(topic);
            return;
        }

        self.messages_parsed.fetch_add(1, Ordering::Relaxed);
    }

    fn decode(
        &self,
        payload: &[u8],
        recv_ts: u64,
        recv_mono_ns: u64,
        connection_epoch: u64,
    ) -> Result<Event, prost::DecodeError> {
        let message = BidOfferV3::decode(payload)?;
        let symbol = message.symbol.to_uppercase();
        let bid_flag = session_flag_from_i32(message.bid_flag);
        let ask_flag = session_flag_from_i32(message.ask_flag);

        if self.config.full_depth {
            Ok(Event::FullBidOffer(FullBidOffer {
                symbol,
                bid_prices: [
                    money_to_f64(&message.bid_price1),
                    money_to_f64(&message.bid_price2),
                    money_to_f64(&message.bid_price3),
                    money_to_f64(&message.bid_price4),
                    money_to_f64(&message.bid_price5),
                    money_to_f64(&message.bid_price6),
                    money_to_f64(&message.bid_price7),
                    money_to_f64(&message.bid_price8),
                    money_to_f64(&message.bid_price9),
                    money_to_f64(&message.bid_price10),
                ],
                ask_prices: [
                    money_to_f64(&message.ask_price1),
                    money_to_f64(&message.ask_price2),
                    money_to_f64(&message.ask_price3),
                    money_to_f64(&message.ask_price4),
                    money_to_f64(&message.ask_price5),
                    money_to_f64(&message.ask_price6),
                    money_to_f64(&message.ask_price7),
                    money_to_f64(&message.ask_price8),
                    money_to_f64(&message.ask_price9),
                    money_to_f64(&message.ask_price10),
                ],
                bid_volumes: [
                    message.bid_volume1,
                    message.bid_volume2,
                    message.bid_volume3,
                    message.bid_volume4,
                    message.bid_volume5,
                    message.bid_volume6,
                    message.bid_volume7,
                    message.bid_volume8,
                    message.bid_volume9,
                    message.bid_volume10,
                ],
                ask_volumes: [
                    message.ask_volume1,
                    message.ask_volume2,
                    message.ask_volume3,
                    message.ask_volume4,
                    message.ask_volume5,
                    message.ask_volume6,
                    message.ask_volume7,
                    message.ask_volume8,
                    message.ask_volume9,
                    message.ask_volume10,
                ],
                bid_flag,
                ask_flag,
                recv_ts,
                recv_mono_ns,
                connection_epoch,
            }))
        } else {
            Ok(Event::BestBidAsk(BestBidAsk {
                symbol,
                bid: money_to_f64(&message.bid_price1),
                ask: money_to_f64(&message.ask_price1),
                bid_vol: message.bid_volume1,
                ask_vol: message.ask_volume1,
                bid_flag,
                ask_flag,
                recv_ts,
                recv_mono_ns,
                connection_epoch,
            }))
        }
    }

    fn record_parse_error(&self, topic: &str, err: &prost::DecodeError) {
        let count = self.parse_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if count <= LOG_DETAIL_COUNT {
            warn!(topic, error = %err, count, "normalizer parse failure");
        } else if count % LOG_SUMMARY_EVERY == 0 {
            warn!(count, "normalizer parse failures (rate-limited summary)");
        }
    }

    fn record_callback_error(&self, topic: &str) {
        let count = self.callback_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if count <= LOG_DETAIL_COUNT {
            error!(topic, count, "normalizer consumer callback panicked");
        } else if count % LOG_SUMMARY_EVERY == 0 {
            error!(count, "normalizer callback failures (rate-limited summary)");
        }
    }

    pub fn stats(&self) -> NormalizerStats {
        NormalizerStats {
            messages_parsed: self.messages_parsed.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            callback_errors: self.callback_errors.load(Ordering::Relaxed),
        }
    }
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
