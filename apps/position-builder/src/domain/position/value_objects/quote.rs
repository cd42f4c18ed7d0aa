//! Option Quote Value Object

use serde::{Deserialize, Serialize};

/// Last known market data for one leg.
///
/// Non-finite inputs are stored as absent, so a `Quote` never carries NaN or
/// infinity into a total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawQuote")]
pub struct Quote {
    bid: Option<f64>,
    ask: Option<f64>,
    delta: Option<f64>,
}

/// Wire form; every decoded quote goes through [`Quote::new`].
#[derive(Deserialize)]
struct RawQuote {
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    delta: Option<f64>,
}

impl From<RawQuote> for Quote {
    fn from(raw: RawQuote) -> Self {
        Self::new(raw.bid, raw.ask, raw.delta)
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl Quote {
    /// Create a quote from possibly-missing values.
    #[must_use]
    pub fn new(bid: Option<f64>, ask: Option<f64>, delta: Option<f64>) -> Self {
        Self {
            bid: finite(bid),
            ask: finite(ask),
            delta: finite(delta),
        }
    }

    /// Create a two-sided quote without greeks.
    #[must_use]
    pub fn two_sided(bid: f64, ask: f64) -> Self {
        Self::new(Some(bid), Some(ask), None)
    }

    /// Attach a delta.
    #[must_use]
    pub fn with_delta(self, delta: f64) -> Self {
        Self {
            delta: finite(Some(delta)),
            ..self
        }
    }

    /// Best bid, if present.
    #[must_use]
    pub const fn bid(&self) -> Option<f64> {
        self.bid
    }

    /// Best ask, if present.
    #[must_use]
    pub const fn ask(&self) -> Option<f64> {
        self.ask
    }

    /// Delta, if present.
    #[must_use]
    pub const fn delta(&self) -> Option<f64> {
        self.delta
    }

    /// Both sides present and finite.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }

    /// `(bid, ask)` when the quote is usable.
    #[must_use]
    pub fn touch(&self) -> Option<(f64, f64)> {
        self.bid.zip(self.ask)
    }

    /// Mid price when the quote is usable.
    #[must_use]
    pub fn mid(&self) -> Option<f64> {
        self.touch().map(|(bid, ask)| (bid + ask) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_sided_is_usable() {
        let quote = Quote::two_sided(10.0, 10.5);
        assert!(quote.is_usable());
        assert_eq!(quote.touch(), Some((10.0, 10.5)));
        assert_eq!(quote.mid(), Some(10.25));
    }

    #[test]
    fn one_sided_is_not_usable() {
        let quote = Quote::new(Some(10.0), None, Some(0.5));
        assert!(!quote.is_usable());
        assert!(quote.mid().is_none());
        assert_eq!(quote.delta(), Some(0.5));
    }

    #[test]
    fn non_finite_values_are_absent() {
        let quote = Quote::new(Some(f64::NAN), Some(f64::INFINITY), Some(f64::NEG_INFINITY));
        assert_eq!(quote.bid(), None);
        assert_eq!(quote.ask(), None);
        assert_eq!(quote.delta(), None);
        assert!(!quote.is_usable());

        let quote = Quote::two_sided(1.0, 1.2).with_delta(f64::NAN);
        assert!(quote.is_usable());
        assert_eq!(quote.delta(), None);
    }

    #[test]
    fn decoding_drops_non_finite_values() {
        let quote: Quote = serde_yaml_bw::from_str("bid: .nan\nask: 10.5\ndelta: -.inf\n").unwrap();
        assert_eq!(quote.bid(), None);
        assert_eq!(quote.ask(), Some(10.5));
        assert_eq!(quote.delta(), None);
        assert!(!quote.is_usable());
    }

    #[test]
    fn decoding_tolerates_missing_fields() {
        let quote: Quote = serde_json::from_str(r#"{"ask": 8.4}"#).unwrap();
        assert_eq!(quote, Quote::new(None, Some(8.4), None));
    }

    #[test]
    fn default_is_empty() {
        let quote = Quote::default();
        assert!(!quote.is_usable());
        assert!(quote.touch().is_none());
    }
}
