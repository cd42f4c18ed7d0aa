//! Position Snapshot Value Object

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::{Leg, LegKey};

/// Immutable, ordered view of the legs at one instant.
///
/// Cloning is cheap; the legs are shared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Position {
    legs: Arc<[Leg]>,
}

impl Position {
    pub(crate) fn from_legs(legs: &[Leg]) -> Self {
        Self {
            legs: Arc::from(legs),
        }
    }

    /// Legs in display order.
    #[must_use]
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Number of legs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.legs.len()
    }

    /// Check if the position has no legs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Find a leg by key.
    #[must_use]
    pub fn get(&self, key: &LegKey) -> Option<&Leg> {
        self.legs.iter().find(|leg| leg.key() == key)
    }

    /// Set of keys in the position.
    #[must_use]
    pub fn key_set(&self) -> BTreeSet<LegKey> {
        self.legs.iter().map(|leg| *leg.key()).collect()
    }

    /// Iterate over the legs.
    pub fn iter(&self) -> std::slice::Iter<'_, Leg> {
        self.legs.iter()
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.legs.iter())
    }
}

impl<'a> IntoIterator for &'a Position {
    type Item = &'a Leg;
    type IntoIter = std::slice::Iter<'a, Leg>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
