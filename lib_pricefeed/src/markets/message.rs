//! # Price Update Message
//!
//! The JSON frame exchanged with the transport and produced by the generator:
//!
//! ```json
//! {"symbol": "AAPL", "price": 178.72}
//! ```
//!
//! Prices are read and written through `serde_json`'s arbitrary precision numbers, so
//! the decimal digits on the wire are exactly the digits stored in the feed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::markets::symbol::validate_price;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMessage {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
}

impl PriceMessage {
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }

    /// Decodes a text frame.
    pub fn decode_str(text: &str) -> Result<Self, FeedError> {
        Self::decode(text.as_bytes())
    }

    /// Decodes a frame and validates its contents.
    pub fn decode(bytes: &[u8]) -> Result<Self, FeedError> {
        let mut message: PriceMessage = serde_json::from_slice(bytes)
            .map_err(|e| FeedError::MalformedMessage(e.to_string()))?;

        if message.symbol.trim().is_empty() {
            return Err(FeedError::MalformedMessage("empty symbol".to_string()));
        }
        message.price = validate_price(&message.symbol, message.price)
            .map_err(|e| FeedError::MalformedMessage(e.to_string()))?;

        Ok(message)
    }

    /// Encodes the message as a compact JSON object.
    pub fn encode(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(|e| FeedError::MalformedMessage(e.to_string()))
    }
}
