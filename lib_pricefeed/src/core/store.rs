//! # Symbol Store
//!
//! Authoritative mapping from ticker to [`Symbol`]. The store never creates symbols
//! after bootstrap and never removes them; [`SymbolStore::apply_update`] is its only
//! mutator.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::FeedError;
use crate::markets::symbol::{validate_price, Symbol, SymbolSpec};

/// Old and new price produced by a single store update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceChange {
    pub old: Decimal,
    pub new: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolStore {
    // Bootstrap order is kept for stable iteration and tie-breaking.
    symbols: Vec<Symbol>,
    slots: HashMap<String, usize>,
}

impl SymbolStore {
    /// Builds the store from the bootstrap universe.
    pub fn from_specs(specs: &[SymbolSpec]) -> Result<Self, FeedError> {
        let mut symbols = Vec::with_capacity(specs.len());
        let mut slots = HashMap::with_capacity(specs.len());

        for spec in specs {
            if slots.contains_key(&spec.id) {
                return Err(FeedError::DuplicateSymbol(spec.id.clone()));
            }
            slots.insert(spec.id.clone(), symbols.len());
            symbols.push(Symbol::from_spec(spec)?);
        }

        Ok(Self { symbols, slots })
    }

    pub fn get(&self, id: &str) -> Option<&Symbol> {
        self.slots.get(id).map(|&slot| &self.symbols[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn price_of(&self, id: &str) -> Option<Decimal> {
        self.get(id).map(Symbol::current_price)
    }

    /// Writes `new_price` for `id`, moving the current price into `previous_price`.
    ///
    /// Unknown tickers and negative prices leave the store untouched.
    pub fn apply_update(&mut self, id: &str, new_price: Decimal) -> Result<PriceChange, FeedError> {
        let slot = *self
            .slots
            .get(id)
            .ok_or_else(|| FeedError::UnknownSymbol(id.to_string()))?;
        let new_price = validate_price(id, new_price)?;

        let symbol = &mut self.symbols[slot];
        let old = symbol.apply_price(new_price);
        Ok(PriceChange {
            old,
            new: symbol.current_price(),
        })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates in bootstrap order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}
