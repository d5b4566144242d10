#![forbid(unsafe_code)]

// Declare the modules to re-export
pub mod core;
pub mod error;
pub mod ingestors; // Transport boundary; the WebSocket client sits behind `ingestors`
pub mod markets;
#[cfg(feature = "loggers")]
pub mod loggers;

// Re-export the public surface
pub use crate::core::{
    FeedEngine, FeedHandle, FeedSnapshot, FeedState, FeedStats, FeedUpdate, GeneratorConfig,
    PriceGenerator, Reposition, SyntheticGenerator,
};
pub use error::FeedError;
pub use ingestors::{LoopbackTransport, PriceSink, Transport, TransportEvent};
pub use markets::{default_universe, load_universe, PriceDirection, PriceMessage, Symbol, SymbolSpec};
