//! mdfeed-adapter — low-latency ingestion adapter for a broker-hosted
//! market-data feed delivered over MQTT-on-WebSocket+TLS.
//!
//! Subscribes to per-symbol topics, decodes a fixed `BidOfferV3` protobuf
//! schema, stamps arrival timestamps, normalizes into one of two immutable
//! event shapes, and hands events to a single downstream consumer through a
//! bounded, drop-oldest dispatcher queue.

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod event;
pub mod liveness;
pub mod normalizer;
pub mod protocol;
pub mod transport;

pub use config::{ConfigError, DispatcherConfig, LivenessConfig, NormalizerConfig, TransportConfig};
pub use dispatcher::{Dispatcher, DispatcherError, DispatcherHealth, DispatcherStats};
pub use event::{BestBidAsk, Event, FullBidOffer, SessionFlag};
pub use liveness::LivenessMonitor;
pub use normalizer::{Normalizer, NormalizerStats};
pub use transport::{
    AuthError, AuthProvider, ControllerState, HostToken, TransportController, TransportError,
    TransportStats,
};
