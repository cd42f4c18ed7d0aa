//! Leg Store Errors

use thiserror::Error;

use super::value_objects::LegKey;

/// Errors from Leg Store operations. A failed operation leaves the store untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LegStoreError {
    /// A leg with this key already exists.
    #[error("Leg already exists: {key}")]
    DuplicateKey {
        /// The conflicting key.
        key: LegKey,
    },

    /// No leg with this key.
    #[error("Leg not found: {key}")]
    NotFound {
        /// The missing key.
        key: LegKey,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn error_display() {
        let key = LegKey::call(NaiveDate::from_ymd_opt(2025, 3, 21).unwrap(), dec!(5000));

        let err = LegStoreError::DuplicateKey { key };
        assert_eq!(err.to_string(), "Leg already exists: 2025-03-21 5000 Call");

        let err = LegStoreError::NotFound { key };
        assert_eq!(err.to_string(), "Leg not found: 2025-03-21 5000 Call");
    }
}
