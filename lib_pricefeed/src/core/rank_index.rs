//! # Rank Index
//!
//! Tickers ordered by descending current price, plus the reverse map from ticker to
//! rank. The index is built once with a full sort and afterwards maintained one update
//! at a time by [`RankIndex::reposition`]:
//!
//! 1. A binary search over the live sequence finds where the updated ticker belongs.
//!    While probing, the ticker's own slot is compared using its *previous* price, so
//!    the sequence being searched is still the one sorted before the update.
//! 2. The ticker is moved with a rotation of the slice between its old and new rank.
//! 3. Only the positions inside that slice are rewritten.
//!
//! Search is `O(log n)`, the move and the position refresh are `O(|from - to| + 1)`.
//!
//! Ties: the updated ticker is always placed after every ticker that already holds an
//! equal price. The initial build keeps bootstrap order among equal prices.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use rust_decimal::Decimal;

use crate::core::store::SymbolStore;
use crate::error::FeedError;

/// What a single reposition did to the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reposition {
    /// The price did not change. Nothing was read or written.
    Unchanged,
    /// The price changed but the ticker keeps its rank.
    Stayed { index: usize },
    /// The ticker moved from one rank to another.
    Moved { from: usize, to: usize },
}

impl Reposition {
    /// The rank range whose position entries were rewritten.
    pub fn touched(&self) -> Option<RangeInclusive<usize>> {
        match *self {
            Reposition::Moved { from, to } => Some(from.min(to)..=from.max(to)),
            _ => None,
        }
    }

    /// The rank range whose ordering is affected by the update, including a ticker
    /// that kept its rank.
    pub fn affected(&self) -> Option<RangeInclusive<usize>> {
        match *self {
            Reposition::Unchanged => None,
            Reposition::Stayed { index } => Some(index..=index),
            Reposition::Moved { .. } => self.touched(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RankIndex {
    sequence: Vec<String>,
    positions: HashMap<String, usize>,
}

impl RankIndex {
    /// Sorts the whole universe by descending price.
    pub fn build(store: &SymbolStore) -> Self {
        let mut index = Self::default();
        index.rebuild(store);
        index
    }

    /// Discards the current order and sorts again from the store.
    pub fn rebuild(&mut self, store: &SymbolStore) {
        let mut ranked: Vec<_> = store.iter().collect();
        // Stable sort, so equal prices keep bootstrap order.
        ranked.sort_by(|a, b| b.current_price().cmp(&a.current_price()));

        self.sequence = ranked.iter().map(|s| s.id().to_string()).collect();
        self.positions = self
            .sequence
            .iter()
            .enumerate()
            .map(|(rank, id)| (id.clone(), rank))
            .collect();
    }

    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Moves `id` to its rank for `new_price`.
    ///
    /// `store` must already hold `new_price` for `id`; `old_price` is the value it
    /// replaced. Every other ticker must be correctly ranked on entry.
    pub fn reposition(
        &mut self,
        store: &SymbolStore,
        id: &str,
        old_price: Decimal,
        new_price: Decimal,
    ) -> Result<Reposition, FeedError> {
        let from = self.position(id).ok_or_else(|| {
            FeedError::InvariantViolation(format!("{} is in the store but not ranked", id))
        })?;

        if old_price == new_price {
            return Ok(Reposition::Unchanged);
        }

        let target = self.search(store, new_price, from, old_price)?;
        // Removing the ticker shifts everything after it one rank up.
        let to = if target > from { target - 1 } else { target };
        if to == from {
            return Ok(Reposition::Stayed { index: from });
        }

        if to < from {
            self.sequence[to..=from].rotate_right(1);
        } else {
            self.sequence[from..=to].rotate_left(1);
        }
        for rank in from.min(to)..=from.max(to) {
            self.positions.insert(self.sequence[rank].clone(), rank);
        }

        Ok(Reposition::Moved { from, to })
    }

    /// Smallest rank whose price is strictly below `price`, probing the moving slot
    /// with its price from before the update.
    fn search(
        &self,
        store: &SymbolStore,
        price: Decimal,
        moving: usize,
        moving_old_price: Decimal,
    ) -> Result<usize, FeedError> {
        let mut low = 0;
        let mut high = self.sequence.len();

        while low < high {
            let mid = low + (high - low) / 2;
            let mid_price = if mid == moving {
                moving_old_price
            } else {
                self.price_at(store, mid)?
            };

            if price > mid_price {
                high = mid;
            } else {
                low = mid + 1;
            }
        }

        Ok(low)
    }

    fn price_at(&self, store: &SymbolStore, rank: usize) -> Result<Decimal, FeedError> {
        let id = &self.sequence[rank];
        store
            .price_of(id)
            .ok_or_else(|| FeedError::InvariantViolation(format!("{} is ranked but not stored", id)))
    }

    /// Checks positions inside `range` and ordering between `range` and its neighbours.
    pub fn verify_local(
        &self,
        store: &SymbolStore,
        range: RangeInclusive<usize>,
    ) -> Result<(), FeedError> {
        if self.sequence.is_empty() {
            return Ok(());
        }
        let last = self.sequence.len() - 1;
        let (start, end) = (*range.start(), (*range.end()).min(last));

        for rank in start..=end {
            let id = &self.sequence[rank];
            if self.positions.get(id) != Some(&rank) {
                return Err(FeedError::InvariantViolation(format!(
                    "position of {} is {:?}, expected {}",
                    id,
                    self.positions.get(id),
                    rank
                )));
            }
        }

        for rank in start.saturating_sub(1)..end.saturating_add(1).min(last) {
            let (upper, lower) = (self.price_at(store, rank)?, self.price_at(store, rank + 1)?);
            if upper < lower {
                return Err(FeedError::InvariantViolation(format!(
                    "{} ({}) ranked above {} ({})",
                    self.sequence[rank],
                    upper,
                    self.sequence[rank + 1],
                    lower
                )));
            }
        }

        Ok(())
    }

    /// Full check of ordering and of the position map against the sequence.
    pub fn verify(&self, store: &SymbolStore) -> Result<(), FeedError> {
        if self.sequence.len() != store.len() || self.positions.len() != store.len() {
            return Err(FeedError::InvariantViolation(format!(
                "{} ranked, {} positions, {} stored",
                self.sequence.len(),
                self.positions.len(),
                store.len()
            )));
        }
        if self.sequence.is_empty() {
            return Ok(());
        }
        self.verify_local(store, 0..=self.sequence.len() - 1)
    }
}
