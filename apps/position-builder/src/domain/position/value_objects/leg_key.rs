//! Leg Key Value Object

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Option right (call or put).
///
/// Declaration order matters: keys sort calls before puts at the same strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionRight {
    /// Call option (right to buy).
    Call,
    /// Put option (right to sell).
    Put,
}

impl OptionRight {
    /// Intrinsic value of one contract at expiry for the given underlying price.
    #[must_use]
    pub fn intrinsic(self, strike: f64, underlying: f64) -> f64 {
        match self {
            Self::Call => (underlying - strike).max(0.0),
            Self::Put => (strike - underlying).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "Call"),
            Self::Put => write!(f, "Put"),
        }
    }
}

/// Identity of a leg within a position: (expiration, strike, right).
///
/// Field order is the sort order of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LegKey {
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Strike price.
    pub strike: Decimal,
    /// Call or put.
    pub right: OptionRight,
}

impl LegKey {
    /// Create a new leg key.
    #[must_use]
    pub const fn new(expiration: NaiveDate, strike: Decimal, right: OptionRight) -> Self {
        Self {
            expiration,
            strike,
            right,
        }
    }

    /// Create a call key.
    #[must_use]
    pub const fn call(expiration: NaiveDate, strike: Decimal) -> Self {
        Self::new(expiration, strike, OptionRight::Call)
    }

    /// Create a put key.
    #[must_use]
    pub const fn put(expiration: NaiveDate, strike: Decimal) -> Self {
        Self::new(expiration, strike, OptionRight::Put)
    }

    /// Same key with a different expiration.
    #[must_use]
    pub const fn with_expiration(self, expiration: NaiveDate) -> Self {
        Self { expiration, ..self }
    }

    /// Same key with a different strike.
    #[must_use]
    pub const fn with_strike(self, strike: Decimal) -> Self {
        Self { strike, ..self }
    }

    /// Same key with a different right.
    #[must_use]
    pub const fn with_right(self, right: OptionRight) -> Self {
        Self { right, ..self }
    }

    /// Strike as a float for payoff arithmetic.
    #[must_use]
    pub fn strike_value(&self) -> f64 {
        self.strike.to_f64().unwrap_or(f64::NAN)
    }
}

impl std::fmt::Display for LegKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.expiration, self.strike, self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    #[test]
    fn option_right_display() {
        assert_eq!(OptionRight::Call.to_string(), "Call");
        assert_eq!(OptionRight::Put.to_string(), "Put");
    }

    #[test]
    fn option_right_serde() {
        let json = serde_json::to_string(&OptionRight::Put).unwrap();
        assert_eq!(json, "\"PUT\"");

        let parsed: OptionRight = serde_json::from_str("\"CALL\"").unwrap();
        assert_eq!(parsed, OptionRight::Call);
    }

    #[test]
    fn intrinsic_value() {
        assert_eq!(OptionRight::Call.intrinsic(5000.0, 5050.0), 50.0);
        assert_eq!(OptionRight::Call.intrinsic(5000.0, 4950.0), 0.0);
        assert_eq!(OptionRight::Put.intrinsic(5000.0, 4950.0), 50.0);
        assert_eq!(OptionRight::Put.intrinsic(5000.0, 5050.0), 0.0);
    }

    #[test]
    fn keys_sort_by_expiration_then_strike_then_right() {
        let april = NaiveDate::from_ymd_opt(2025, 4, 17).unwrap();
        let mut keys = vec![
            LegKey::put(march(), dec!(5000)),
            LegKey::call(april, dec!(4900)),
            LegKey::call(march(), dec!(5100)),
            LegKey::call(march(), dec!(5000)),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                LegKey::call(march(), dec!(5000)),
                LegKey::put(march(), dec!(5000)),
                LegKey::call(march(), dec!(5100)),
                LegKey::call(april, dec!(4900)),
            ]
        );
    }

    #[test]
    fn strike_equality_is_exact() {
        assert_eq!(
            LegKey::call(march(), dec!(5000)),
            LegKey::call(march(), dec!(5000.00))
        );
    }

    #[test]
    fn with_field_builders() {
        let key = LegKey::call(march(), dec!(5000));
        assert_eq!(key.with_strike(dec!(5050)).strike, dec!(5050));
        assert_eq!(key.with_right(OptionRight::Put).right, OptionRight::Put);
        let april = NaiveDate::from_ymd_opt(2025, 4, 17).unwrap();
        assert_eq!(key.with_expiration(april).expiration, april);
    }

    #[test]
    fn display() {
        let key = LegKey::put(march(), dec!(4950.5));
        assert_eq!(key.to_string(), "2025-03-21 4950.5 Put");
    }
}
