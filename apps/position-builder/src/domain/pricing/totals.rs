//! Composite Totals
//!
//! Lazy bot price: every buy pays the ask, every sell receives the bid.
//! Smart bot price: every leg trades at mid.
//!
//! Both are all-or-nothing: one leg without a usable quote makes the total
//! [`Total::Unknown`], never a partial sum over the legs that do have data.

use serde::Serialize;

use crate::domain::position::{Leg, LegAction, Position};

/// Net debit or credit of a composite price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// Net cost (pay).
    Debit,
    /// Net proceeds (receive).
    Credit,
    /// Flat.
    Zero,
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debit => write!(f, "debit"),
            Self::Credit => write!(f, "credit"),
            Self::Zero => write!(f, "flat"),
        }
    }
}

/// A composite price that may not be computable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Total {
    /// Every leg had a usable quote.
    Known(f64),
    /// At least one leg lacked a usable quote.
    Unknown,
}

impl Total {
    /// The value, if known.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self {
            Self::Known(v) => Some(*v),
            Self::Unknown => None,
        }
    }

    /// Check if the total is known.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Debit / credit / zero; `None` when unknown.
    #[must_use]
    pub fn sign(&self) -> Option<Sign> {
        self.value().map(|v| {
            if v > 0.0 {
                Sign::Debit
            } else if v < 0.0 {
                Sign::Credit
            } else {
                Sign::Zero
            }
        })
    }
}

impl From<Option<f64>> for Total {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

/// Both composite prices plus net delta for one position snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    /// Lazy bot price.
    pub lazy: Total,
    /// Smart bot price.
    pub smart: Total,
    /// Net position delta, if every leg reported one.
    pub net_delta: Option<f64>,
}

impl Totals {
    /// Price a position.
    #[must_use]
    pub fn compute(position: &Position) -> Self {
        Self {
            lazy: lazy_total(position),
            smart: smart_total(position),
            net_delta: net_delta(position),
        }
    }

    /// Totals that are not computable.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            lazy: Total::Unknown,
            smart: Total::Unknown,
            net_delta: None,
        }
    }
}

fn signed_sum<F>(position: &Position, price: F) -> Total
where
    F: Fn(&Leg, f64, f64) -> f64,
{
    position
        .iter()
        .map(|leg| {
            leg.touch()
                .map(|(bid, ask)| price(leg, bid, ask) * leg.signed_quantity())
        })
        .sum::<Option<f64>>()
        .into()
}

/// Lazy bot total: buys at the ask, sells at the bid.
#[must_use]
pub fn lazy_total(position: &Position) -> Total {
    signed_sum(position, |leg, bid, ask| match leg.action() {
        LegAction::Buy => ask,
        LegAction::Sell => bid,
    })
}

/// Smart bot total: every leg at mid.
#[must_use]
pub fn smart_total(position: &Position) -> Total {
    signed_sum(position, |_, bid, ask| (bid + ask) / 2.0)
}

/// Net delta: sum of signed contract count times leg delta.
#[must_use]
pub fn net_delta(position: &Position) -> Option<f64> {
    position
        .iter()
        .map(|leg| {
            leg.quote()
                .and_then(|q| q.delta())
                .map(|delta| delta * leg.signed_quantity())
        })
        .sum()
}

/// Label a total the way the builder shows it: `+2.50 (debit)`.
#[must_use]
pub fn format_total(total: Total) -> String {
    match (total.value(), total.sign()) {
        (Some(v), Some(Sign::Zero)) => format!("{v:.2}"),
        (Some(v), Some(sign)) => format!("{v:+.2} ({sign})"),
        _ => "—".to_string(),
    }
}
