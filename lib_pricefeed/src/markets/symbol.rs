//! # Tracked Symbols
//!
//! The price state of a single ticker. A symbol is created once from a bootstrap
//! [`SymbolSpec`] and afterwards only changes through [`Symbol::apply_price`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// Direction of the last price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

impl PriceDirection {
    /// A one-character marker, handy for plain-text reports.
    pub fn arrow(self) -> &'static str {
        match self {
            PriceDirection::Up => "↑",
            PriceDirection::Down => "↓",
            PriceDirection::Flat => "–",
        }
    }
}

/// # Symbol Spec
///
/// One entry of the symbol universe supplied at startup. The order of the list is the
/// tie-break order of the initial ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSpec {
    /// The ticker, unique within the universe.
    pub id: String,
    /// Company name shown by presentation layers.
    pub display_name: String,
    /// Free-form description shown by presentation layers.
    #[serde(default)]
    pub description: String,
    /// Opening price.
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub initial_price: Decimal,
}

impl SymbolSpec {
    pub fn new(id: &str, display_name: &str, description: &str, initial_price: Decimal) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            initial_price,
        }
    }
}

/// # Symbol
///
/// Current and previous price of one ticker. `previous_price` always holds the value
/// that `current_price` had right before the last update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    id: String,
    display_name: String,
    description: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    current_price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    previous_price: Decimal,
}

impl Symbol {
    /// Builds a symbol from its bootstrap record. Both prices start at the initial price.
    pub fn from_spec(spec: &SymbolSpec) -> Result<Self, FeedError> {
        let price = validate_price(&spec.id, spec.initial_price)?;
        Ok(Self {
            id: spec.id.clone(),
            display_name: spec.display_name.clone(),
            description: spec.description.clone(),
            current_price: price,
            previous_price: price,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn current_price(&self) -> Decimal {
        self.current_price
    }

    pub fn previous_price(&self) -> Decimal {
        self.previous_price
    }

    /// Derived from the two stored prices, never stored itself.
    pub fn direction(&self) -> PriceDirection {
        match self.current_price.cmp(&self.previous_price) {
            std::cmp::Ordering::Greater => PriceDirection::Up,
            std::cmp::Ordering::Less => PriceDirection::Down,
            std::cmp::Ordering::Equal => PriceDirection::Flat,
        }
    }

    /// Shifts the current price into `previous_price` and stores `new_price`.
    /// Returns the price that was replaced.
    pub(crate) fn apply_price(&mut self, new_price: Decimal) -> Decimal {
        let old = self.current_price;
        self.previous_price = old;
        self.current_price = normalize_zero(new_price);
        old
    }
}

/// Rejects negative prices and folds negative zero into zero.
pub(crate) fn validate_price(symbol: &str, price: Decimal) -> Result<Decimal, FeedError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(FeedError::InvalidPrice {
            symbol: symbol.to_string(),
            price,
        });
    }
    Ok(normalize_zero(price))
}

fn normalize_zero(price: Decimal) -> Decimal {
    if price.is_zero() {
        Decimal::ZERO
    } else {
        price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn spec(price: &str) -> SymbolSpec {
        SymbolSpec::new("AAA", "A Co.", "", Decimal::from_str(price).unwrap())
    }

    #[test]
    fn test_new_symbol_is_flat() {
        let symbol = Symbol::from_spec(&spec("300")).unwrap();
        assert_eq!(symbol.current_price(), symbol.previous_price());
        assert_eq!(symbol.direction(), PriceDirection::Flat);
    }

    #[test]
    fn test_apply_price_tracks_previous_and_direction() {
        let mut symbol = Symbol::from_spec(&spec("300")).unwrap();

        let old = symbol.apply_price(Decimal::from(299));
        assert_eq!(old, Decimal::from(300));
        assert_eq!(symbol.current_price(), Decimal::from(299));
        assert_eq!(symbol.previous_price(), Decimal::from(300));
        assert_eq!(symbol.direction(), PriceDirection::Down);

        symbol.apply_price(Decimal::from(310));
        assert_eq!(symbol.previous_price(), Decimal::from(299));
        assert_eq!(symbol.direction(), PriceDirection::Up);

        symbol.apply_price(Decimal::from(310));
        assert_eq!(symbol.direction(), PriceDirection::Flat);
    }

    #[test]
    fn test_negative_price_rejected() {
        let err = Symbol::from_spec(&spec("-1.50")).unwrap_err();
        assert!(matches!(err, FeedError::InvalidPrice { .. }));
    }

    #[test]
    fn test_negative_zero_normalized() {
        let symbol = Symbol::from_spec(&spec("-0.00")).unwrap();
        assert!(!symbol.current_price().is_sign_negative());
    }
}
