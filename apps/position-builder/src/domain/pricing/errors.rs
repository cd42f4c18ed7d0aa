//! Pricing Errors

use thiserror::Error;

/// Errors from the pricing engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Price grid cannot be iterated.
    #[error("Invalid price range: {message}")]
    InvalidPriceRange {
        /// What is wrong with it.
        message: String,
    },
}
