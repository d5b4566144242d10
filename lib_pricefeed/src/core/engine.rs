//! # Feed Engine
//!
//! The single-writer aggregate of the [`SymbolStore`] and the [`RankIndex`]. One call to
//! [`FeedEngine::apply`] updates the store, repositions the ticker and checks the
//! touched part of the ranking, all without suspending. Callers serialize access to
//! the engine; the supervisor does so with a write lock held for the whole call.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::rank_index::{RankIndex, Reposition};
use crate::core::store::SymbolStore;
use crate::error::FeedError;
use crate::markets::message::PriceMessage;
use crate::markets::symbol::{Symbol, SymbolSpec};

/// Counters kept alongside the ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    /// Updates written to the store.
    pub applied: u64,
    /// Updates that moved a ticker to another rank.
    pub reordered: u64,
    /// Updates carrying the price the ticker already had.
    pub unchanged: u64,
    /// Updates for tickers outside the universe.
    pub unknown_dropped: u64,
    /// Updates for known tickers carrying a negative price.
    pub invalid_dropped: u64,
    /// Frames the transport could not decode.
    pub malformed_dropped: u64,
    /// Full rebuilds after a failed ranking check.
    pub self_heals: u64,
}

/// Result of one applied update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub symbol: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub reposition: Reposition,
}

/// A consistent copy of the ranking and of every symbol, for readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSnapshot {
    /// Tickers by descending price.
    pub ranking: Vec<String>,
    /// Symbols in ranking order.
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct FeedEngine {
    store: SymbolStore,
    index: RankIndex,
    stats: FeedStats,
}

impl FeedEngine {
    /// Builds the store and the initial ranking from the bootstrap universe.
    pub fn new(specs: &[SymbolSpec]) -> Result<Self, FeedError> {
        let store = SymbolStore::from_specs(specs)?;
        let index = RankIndex::build(&store);
        tracing::debug!(symbols = store.len(), "Feed engine bootstrapped");
        Ok(Self {
            store,
            index,
            stats: FeedStats::default(),
        })
    }

    /// Applies one price message.
    ///
    /// Unknown tickers and negative prices leave the engine untouched. The error is
    /// counted and returned.
    pub fn apply(&mut self, message: &PriceMessage) -> Result<AppliedUpdate, FeedError> {
        let change = match self.store.apply_update(&message.symbol, message.price) {
            Ok(change) => change,
            Err(e) => {
                match e {
                    FeedError::UnknownSymbol(_) => self.stats.unknown_dropped += 1,
                    _ => self.stats.invalid_dropped += 1,
                }
                return Err(e);
            }
        };
        self.stats.applied += 1;

        let reposition = match self
            .index
            .reposition(&self.store, &message.symbol, change.old, change.new)
        {
            Ok(reposition) => reposition,
            Err(e) => {
                self.heal(&e);
                Reposition::Unchanged
            }
        };

        if let Some(range) = reposition.affected() {
            if let Err(e) = self.index.verify_local(&self.store, range) {
                self.heal(&e);
            }
        }

        match reposition {
            Reposition::Unchanged => self.stats.unchanged += 1,
            Reposition::Moved { .. } => self.stats.reordered += 1,
            Reposition::Stayed { .. } => {}
        }

        Ok(AppliedUpdate {
            symbol: message.symbol.clone(),
            old_price: change.old,
            new_price: change.new,
            reposition,
        })
    }

    fn heal(&mut self, violation: &FeedError) {
        debug_assert!(false, "rank index corrupted: {}", violation);
        tracing::error!(error = %violation, "Rank index corrupted, rebuilding from store");
        self.index.rebuild(&self.store);
        self.stats.self_heals += 1;
    }

    /// Counts a frame the transport could not decode.
    pub fn record_malformed(&mut self) {
        self.stats.malformed_dropped += 1;
    }

    pub fn get(&self, id: &str) -> Option<&Symbol> {
        self.store.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.contains(id)
    }

    pub fn ranking(&self) -> &[String] {
        self.index.sequence()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.position(id)
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Copies the ranking and the symbols it refers to.
    pub fn snapshot(&self) -> FeedSnapshot {
        let ranking = self.index.sequence().to_vec();
        let symbols = ranking
            .iter()
            .filter_map(|id| self.store.get(id).cloned())
            .collect();
        FeedSnapshot { ranking, symbols }
    }

    /// Full consistency check, `O(n)`.
    pub fn verify(&self) -> Result<(), FeedError> {
        self.index.verify(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::symbol::PriceDirection;

    fn engine() -> FeedEngine {
        FeedEngine::new(&[
            SymbolSpec::new("AAA", "A Co.", "", Decimal::from(300)),
            SymbolSpec::new("BBB", "B Co.", "", Decimal::from(200)),
            SymbolSpec::new("CCC", "C Co.", "", Decimal::from(100)),
        ])
        .unwrap()
    }

    #[test]
    fn test_apply_reorders_and_counts() {
        let mut engine = engine();
        let applied = engine
            .apply(&PriceMessage::new("CCC", Decimal::from(500)))
            .unwrap();

        assert_eq!(applied.reposition, Reposition::Moved { from: 2, to: 0 });
        assert_eq!(engine.ranking(), ["CCC", "AAA", "BBB"]);
        assert_eq!(engine.get("CCC").unwrap().current_price(), Decimal::from(500));
        assert_eq!(engine.stats().applied, 1);
        assert_eq!(engine.stats().reordered, 1);
    }

    #[test]
    fn test_apply_same_rank_updates_store() {
        let mut engine = engine();
        engine.apply(&PriceMessage::new("AAA", Decimal::from(299))).unwrap();

        let a = engine.get("AAA").unwrap();
        assert_eq!(engine.ranking(), ["AAA", "BBB", "CCC"]);
        assert_eq!(a.current_price(), Decimal::from(299));
        assert_eq!(a.previous_price(), Decimal::from(300));
        assert_eq!(a.direction(), PriceDirection::Down);
    }

    #[test]
    fn test_unknown_symbol_is_inert() {
        let mut engine = engine();
        let before = engine.snapshot();

        let err = engine
            .apply(&PriceMessage::new("UNKNOWN", Decimal::from(999)))
            .unwrap_err();

        assert_eq!(err, FeedError::UnknownSymbol("UNKNOWN".to_string()));
        assert_eq!(engine.snapshot(), before);
        assert!(engine.get("UNKNOWN").is_none());
        assert_eq!(engine.stats().unknown_dropped, 1);
        assert_eq!(engine.stats().applied, 0);
    }

    #[test]
    fn test_negative_price_is_rejected_and_counted() {
        let mut engine = engine();
        let before = engine.snapshot();
        let price = Decimal::from(-5);

        let err = engine.apply(&PriceMessage::new("CCC", price)).unwrap_err();

        assert_eq!(err, FeedError::InvalidPrice { symbol: "CCC".to_string(), price });
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.get("CCC").unwrap().current_price(), Decimal::from(100));
        let stats = engine.stats();
        assert_eq!(stats.invalid_dropped, 1);
        assert_eq!(stats.unknown_dropped, 0);
        assert_eq!(stats.applied, 0);
        engine.verify().unwrap();
    }

    #[test]
    fn test_equal_price_counts_unchanged() {
        let mut engine = engine();
        let applied = engine.apply(&PriceMessage::new("BBB", Decimal::from(200))).unwrap();
        assert_eq!(applied.reposition, Reposition::Unchanged);
        assert_eq!(engine.stats().unchanged, 1);
        assert_eq!(engine.get("BBB").unwrap().direction(), PriceDirection::Flat);
    }

    #[test]
    fn test_snapshot_follows_ranking() {
        let mut engine = engine();
        engine.apply(&PriceMessage::new("BBB", Decimal::from(350))).unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.ranking, ["BBB", "AAA", "CCC"]);
        let ids: Vec<_> = snapshot.symbols.iter().map(|s| s.id()).collect();
        assert_eq!(ids, ["BBB", "AAA", "CCC"]);
    }

    #[test]
    fn test_duplicate_universe_rejected() {
        let err = FeedEngine::new(&[
            SymbolSpec::new("AAA", "A Co.", "", Decimal::from(1)),
            SymbolSpec::new("AAA", "A Co.", "", Decimal::from(2)),
        ])
        .unwrap_err();
        assert_eq!(err, FeedError::DuplicateSymbol("AAA".to_string()));
    }
}
