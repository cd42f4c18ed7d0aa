//! Position Leg Value Object

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use super::{LegKey, Quote};

/// Whether the leg is bought (debit) or sold (credit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegAction {
    /// Bought leg, pays the ask.
    Buy,
    /// Sold leg, receives the bid.
    Sell,
}

impl LegAction {
    /// Get the sign multiplier for this action.
    #[must_use]
    pub const fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }

    /// Check if this is a bought leg.
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl std::fmt::Display for LegAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// A single leg of the working position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    key: LegKey,
    action: LegAction,
    multiplier: NonZeroU32,
    quote: Option<Quote>,
}

impl Leg {
    /// Create a new leg with no quote yet.
    #[must_use]
    pub const fn new(key: LegKey, action: LegAction, multiplier: NonZeroU32) -> Self {
        Self {
            key,
            action,
            multiplier,
            quote: None,
        }
    }

    /// Get the key.
    #[must_use]
    pub const fn key(&self) -> &LegKey {
        &self.key
    }

    /// Get the action.
    #[must_use]
    pub const fn action(&self) -> LegAction {
        self.action
    }

    /// Get the multiplier.
    #[must_use]
    pub const fn multiplier(&self) -> NonZeroU32 {
        self.multiplier
    }

    /// Last reconciled quote, if any.
    #[must_use]
    pub const fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    /// Signed contract count: `+multiplier` for buys, `-multiplier` for sells.
    #[must_use]
    pub fn signed_quantity(&self) -> f64 {
        f64::from(self.multiplier.get()) * self.action.sign()
    }

    /// Usable `(bid, ask)` for this leg.
    #[must_use]
    pub fn touch(&self) -> Option<(f64, f64)> {
        self.quote.and_then(|q| q.touch())
    }

    pub(crate) const fn set_action(&mut self, action: LegAction) {
        self.action = action;
    }

    pub(crate) const fn set_multiplier(&mut self, multiplier: NonZeroU32) {
        self.multiplier = multiplier;
    }

    pub(crate) const fn set_quote(&mut self, quote: Option<Quote>) {
        self.quote = quote;
    }

    pub(crate) const fn rekey(&mut self, key: LegKey) {
        self.key = key;
        self.quote = None;
    }
}
