//! Event Types
//!
//! Immutable shapes produced by the normalizer and carried through the
//! dispatcher to the consumer. Events are constructed once and never
//! mutated; they compare and hash structurally.

/// Market session indicator carried on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionFlag {
    #[default]
    Undefined = 0,
    Normal = 1,
    Ato = 2,
    Atc = 3,
}

impl SessionFlag {
    /// True for the opening/closing auction flags.
    pub fn is_auction(&self) -> bool {
        matches!(self, SessionFlag::Ato | SessionFlag::Atc)
    }

    pub(crate) fn from_proto(value: i32) -> Self {
        match value {
            1 => SessionFlag::Normal,
            2 => SessionFlag::Ato,
            3 => SessionFlag::Atc,
            _ => SessionFlag::Undefined,
        }
    }
}

/// Best bid/ask snapshot (top of book only).
#[derive(Debug, Clone, PartialEq)]
pub struct BestBidAsk {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub bid_vol: i64,
    pub ask_vol: i64,
    pub bid_flag: SessionFlag,
    pub ask_flag: SessionFlag,
    pub recv_ts: u64,
    pub recv_mono_ns: u64,
    pub connection_epoch: u64,
}

impl BestBidAsk {
    pub fn is_auction(&self) -> bool {
        self.bid_flag.is_auction() || self.ask_flag.is_auction()
    }
}

/// Full 10-level bid/ask book.
#[derive(Debug, Clone, PartialEq)]
pub struct FullBidOffer {
    pub symbol: String,
    pub bid_prices: [f64; 10],
    pub ask_prices: [f64; 10],
    pub bid_volumes: [i64; 10],
    pub ask_volumes: [i64; 10],
    pub bid_flag: SessionFlag,
    pub ask_flag: SessionFlag,
    pub recv_ts: u64,
    pub recv_mono_ns: u64,
    pub connection_epoch: u64,
}

impl FullBidOffer {
    pub fn is_auction(&self) -> bool {
        self.bid_flag.is_auction() || self.ask_flag.is_auction()
    }
}

/// Tagged union of the two event shapes the normalizer can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    BestBidAsk(BestBidAsk),
    FullBidOffer(FullBidOffer),
}

impl Event {
    pub fn symbol(&self) -> &str {
        match self {
            Event::BestBidAsk(e) => &e.symbol,
            Event::FullBidOffer(e) => &e.symbol,
        }
    }

    pub fn connection_epoch(&self) -> u64 {
        match self {
            Event::BestBidAsk(e) => e.connection_epoch,
            Event::FullBidOffer(e) => e.connection_epoch,
        }
    }

    pub fn recv_mono_ns(&self) -> u64 {
        match self {
            Event::BestBidAsk(e) => e.recv_mono_ns,
            Event::FullBidOffer(e) => e.recv_mono_ns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auction_predicate_true_for_ato_and_atc() {
        assert!(!SessionFlag::Undefined.is_auction());
        assert!(!SessionFlag::Normal.is_auction());
        assert!(SessionFlag::Ato.is_auction());
        assert!(SessionFlag::Atc.is_auction());
    }

    #[test]
    fn from_proto_maps_unknown_values_to_undefined() {
        assert_eq!(SessionFlag::from_proto(0), SessionFlag::Undefined);
        assert_eq!(SessionFlag::from_proto(1), SessionFlag::Normal);
        assert_eq!(SessionFlag::from_proto(2), SessionFlag::Ato);
        assert_eq!(SessionFlag::from_proto(3), SessionFlag::Atc);
        assert_eq!(SessionFlag::from_proto(99), SessionFlag::Undefined);
    }

    #[test]
    fn best_bid_ask_is_auction_checks_either_flag() {
        let mut e = BestBidAsk {
            symbol: "AOT".into(),
            bid: 25.5,
            ask: 25.75,
            bid_vol: 1000,
            ask_vol: 500,
            bid_flag: SessionFlag::Normal,
            ask_flag: SessionFlag::Normal,
            recv_ts: 0,
            recv_mono_ns: 0,
            connection_epoch: 0,
        };
        assert!(!e.is_auction());
        e.ask_flag = SessionFlag::Ato;
        assert!(e.is_auction());
    }
}
