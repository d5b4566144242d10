//! # Feed Errors
//!
//! A single error type shared by the store, the rank index, the wire codec and the
//! supervisor. Only bootstrap errors are meant to reach an end user; the rest are
//! counted and dropped by the supervisor.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// An update referenced a symbol the store does not track.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// An inbound payload could not be decoded into a price message.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A send or receive on the transport failed.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The rank sequence and its position map disagree.
    #[error("Rank index invariant violated: {0}")]
    InvariantViolation(String),

    /// The bootstrap universe lists the same identifier twice.
    #[error("Duplicate symbol in universe: {0}")]
    DuplicateSymbol(String),

    /// The bootstrap universe file could not be read or parsed.
    #[error("Invalid symbol universe: {0}")]
    InvalidUniverse(String),

    /// A price was negative.
    #[error("Invalid price {price} for symbol {symbol}")]
    InvalidPrice { symbol: String, price: Decimal },

    /// The supervisor task is no longer running.
    #[error("Feed supervisor is closed")]
    SupervisorClosed,
}
