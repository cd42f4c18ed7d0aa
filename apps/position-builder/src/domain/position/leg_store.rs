//! Leg Store Aggregate
//!
//! Owns the working legs and their last reconciled quotes. Every mutation
//! either fully applies and returns a fresh [`Position`] snapshot, or fails
//! without touching the store.
//!
//! # Invariants
//!
//! - No two legs share a [`LegKey`].
//! - Legs are kept sorted by key (expiration, strike, right).
//! - A key change always drops the leg's quote.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::errors::LegStoreError;
use super::value_objects::{Leg, LegAction, LegKey, OptionRight, Position, Quote};

/// Editable leg field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegField {
    /// Buy or sell.
    Action(LegAction),
    /// Contract count.
    Multiplier(NonZeroU32),
    /// Expiration (key change).
    Expiration(NaiveDate),
    /// Strike (key change).
    Strike(Decimal),
    /// Call or put (key change).
    Right(OptionRight),
}

impl LegField {
    /// Whether editing this field changes the leg's identity.
    #[must_use]
    pub const fn is_key_field(&self) -> bool {
        matches!(
            self,
            Self::Expiration(_) | Self::Strike(_) | Self::Right(_)
        )
    }

    fn candidate_key(&self, key: LegKey) -> LegKey {
        match *self {
            Self::Expiration(expiration) => key.with_expiration(expiration),
            Self::Strike(strike) => key.with_strike(strike),
            Self::Right(right) => key.with_right(right),
            Self::Action(_) | Self::Multiplier(_) => key,
        }
    }
}

/// What an edit did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// A non-key field changed in place.
    Updated,
    /// The leg moved to a new key; its quote was dropped.
    Rekeyed {
        /// The leg's new key.
        key: LegKey,
    },
    /// The new key belonged to another leg; the edited leg was removed.
    Merged {
        /// The surviving leg's key.
        into: LegKey,
    },
    /// The candidate key equals the current key.
    Unchanged,
}

impl EditOutcome {
    /// Whether the store's key set changed.
    #[must_use]
    pub const fn changes_keys(&self) -> bool {
        matches!(self, Self::Rekeyed { .. } | Self::Merged { .. })
    }
}

/// Identity-keyed, ordered collection of legs.
#[derive(Debug, Clone, Default)]
pub struct LegStore {
    legs: Vec<Leg>,
}

impl LegStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self { legs: Vec::new() }
    }

    /// Current snapshot.
    #[must_use]
    pub fn position(&self) -> Position {
        Position::from_legs(&self.legs)
    }

    /// Number of legs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.legs.len()
    }

    /// Check if there are no legs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Current key set.
    #[must_use]
    pub fn key_set(&self) -> BTreeSet<LegKey> {
        self.legs.iter().map(|leg| *leg.key()).collect()
    }

    /// Check if a key is present.
    #[must_use]
    pub fn contains(&self, key: &LegKey) -> bool {
        self.index_of(key).is_some()
    }

    /// Add a leg.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if a leg with this key exists.
    pub fn add(
        &mut self,
        action: LegAction,
        multiplier: NonZeroU32,
        key: LegKey,
    ) -> Result<Position, LegStoreError> {
        if self.contains(&key) {
            return Err(LegStoreError::DuplicateKey { key });
        }
        self.legs.push(Leg::new(key, action, multiplier));
        self.sort();
        Ok(self.position())
    }

    /// Remove a leg.
    ///
    /// # Errors
    ///
    /// `NotFound` if no leg has this key.
    pub fn remove(&mut self, key: &LegKey) -> Result<Position, LegStoreError> {
        let index = self
            .index_of(key)
            .ok_or(LegStoreError::NotFound { key: *key })?;
        self.legs.remove(index);
        self.sort();
        Ok(self.position())
    }

    /// Remove every leg.
    pub fn clear(&mut self) -> Position {
        self.legs.clear();
        self.position()
    }

    /// Edit one field of a leg.
    ///
    /// Key fields go through merge-or-replace: if the candidate key belongs to
    /// a different leg, the edited leg is dropped and the existing one kept as
    /// is; otherwise the leg is rekeyed and its quote reset.
    ///
    /// # Errors
    ///
    /// `NotFound` if no leg has this key.
    pub fn edit(
        &mut self,
        key: &LegKey,
        field: LegField,
    ) -> Result<(Position, EditOutcome), LegStoreError> {
        let index = self
            .index_of(key)
            .ok_or(LegStoreError::NotFound { key: *key })?;

        let outcome = match field {
            LegField::Action(action) => {
                self.legs[index].set_action(action);
                EditOutcome::Updated
            }
            LegField::Multiplier(multiplier) => {
                self.legs[index].set_multiplier(multiplier);
                EditOutcome::Updated
            }
            LegField::Expiration(_) | LegField::Strike(_) | LegField::Right(_) => {
                let candidate = field.candidate_key(*key);
                self.change_key(index, candidate)
            }
        };

        Ok((self.position(), outcome))
    }

    fn change_key(&mut self, index: usize, candidate: LegKey) -> EditOutcome {
        if *self.legs[index].key() == candidate {
            return EditOutcome::Unchanged;
        }

        if self.contains(&candidate) {
            self.legs.remove(index);
            return EditOutcome::Merged { into: candidate };
        }

        self.legs[index].rekey(candidate);
        self.sort();
        EditOutcome::Rekeyed { key: candidate }
    }

    /// Replace every leg's quote with the batch entry for its key.
    ///
    /// The caller must have checked that the batch covers exactly the current
    /// key set; legs without an entry end up with no quote.
    pub fn apply_quotes(&mut self, quotes: &BTreeMap<LegKey, Option<Quote>>) -> Position {
        for leg in &mut self.legs {
            let quote = quotes.get(leg.key()).copied().flatten();
            leg.set_quote(quote);
        }
        self.position()
    }

    fn index_of(&self, key: &LegKey) -> Option<usize> {
        self.legs.iter().position(|leg| leg.key() == key)
    }

    fn sort(&mut self) {
        self.legs.sort_by(|a, b| a.key().cmp(b.key()));
    }
}
