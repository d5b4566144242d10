//! # Core Engine Module
//!
//! The ranked price book and the machinery that keeps it moving.
//!
//! ## Core Components:
//!
//! - **`store`**: every tracked [`Symbol`](crate::markets::Symbol), keyed by ticker.
//!   The only place prices are written.
//!
//! - **`rank_index`**: the descending-price ranking. A price change repositions one
//!   ticker with a binary search and a rotation of the slice between its old and new
//!   rank; nothing outside that slice is touched.
//!
//! - **`engine`**: store and ranking as one single-writer unit, plus counters.
//!
//! - **`supervisor`**: the task that owns the engine, drives the connection state
//!   machine and starts or stops the generator as the transport comes and goes.
//!
//! - **`generator`**: the synthetic random-walk price source.

/// Symbol storage keyed by ticker.
pub mod store;
/// Incremental descending-price ranking.
pub mod rank_index;
/// Store and ranking combined under one writer.
pub mod engine;
/// Connection state machine and engine owner.
pub mod supervisor;
/// Synthetic random-walk price source.
pub mod generator;

// --- Public API Re-exports ---
pub use engine::{AppliedUpdate, FeedEngine, FeedSnapshot, FeedStats};
pub use generator::{GeneratorConfig, PriceGenerator, SyntheticGenerator};
pub use rank_index::{RankIndex, Reposition};
pub use store::{PriceChange, SymbolStore};
pub use supervisor::{FeedHandle, FeedState, FeedUpdate};
