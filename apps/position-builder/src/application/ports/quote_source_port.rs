//! Quote Source Port
//!
//! The broker connection as the builder sees it: one logical session that
//! answers "what are the quotes for these legs". Calls are slow and must be
//! serialized; the [`QuoteWorker`](crate::application::services::QuoteWorker)
//! is the only caller.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::position::{LegKey, Quote};

/// Quotes keyed by leg. `None` means the source had nothing for that leg.
pub type QuoteBatch = BTreeMap<LegKey, Option<Quote>>;

/// Quote source errors.
///
/// A leg the source simply has no quote for is not an error; it comes back
/// as `None` in the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteSourceError {
    /// Session dropped or timed out.
    #[error("connection lost: {message}")]
    ConnectionLost {
        /// Error details.
        message: String,
    },

    /// The option chain for a requested expiration could not be resolved.
    #[error("no quotes for these strikes/expirations: {key}")]
    ChainLookupFailed {
        /// First key whose chain lookup failed.
        key: LegKey,
    },
}

impl QuoteSourceError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionLost { .. } => "connection_lost",
            Self::ChainLookupFailed { .. } => "chain_lookup_failed",
        }
    }
}

/// Port for fetching option quotes.
#[async_trait]
pub trait QuoteSourcePort: Send + Sync {
    /// Fetch quotes for a set of legs.
    ///
    /// Implementations may return fewer or more keys than asked for; the
    /// worker normalizes the batch before it reaches the builder.
    ///
    /// # Errors
    ///
    /// `ConnectionLost` if the session is unusable, `ChainLookupFailed` if an
    /// expiration has no chain.
    async fn fetch(&self, keys: &BTreeSet<LegKey>) -> Result<QuoteBatch, QuoteSourceError>;

    /// List the expirations the source can quote, ascending.
    ///
    /// # Errors
    ///
    /// `ConnectionLost` if the session is unusable.
    async fn expirations(&self) -> Result<Vec<NaiveDate>, QuoteSourceError>;
}
