//! Option Chain Quote Source
//!
//! Serves quotes from an option chain snapshot kept in a YAML file:
//!
//! ```yaml
//! underlying: SPX
//! expirations:
//!   "2025-03-21":
//!     - { strike: 5000, right: CALL, bid: 10.0, ask: 10.5, delta: 0.52 }
//!     - { strike: 5000, right: PUT, bid: 8.0, ask: 8.4, delta: -0.47 }
//! ```
//!
//! Each call sleeps for the configured latency to stand in for a broker round
//! trip, and is recorded on the `quote_source::access` log target.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::application::ports::{QuoteBatch, QuoteSourceError, QuoteSourcePort};
use crate::domain::position::{LegKey, OptionRight, Quote};

/// Log target for session access.
const ACCESS_TARGET: &str = "quote_source::access";

/// One quoted contract in the chain file.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainRow {
    /// Strike price.
    pub strike: Decimal,
    /// Call or put.
    pub right: OptionRight,
    /// Bid, if quoted.
    #[serde(default)]
    pub bid: Option<f64>,
    /// Ask, if quoted.
    #[serde(default)]
    pub ask: Option<f64>,
    /// Delta, if quoted.
    #[serde(default)]
    pub delta: Option<f64>,
}

/// Chain file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainFile {
    /// Underlying symbol.
    pub underlying: String,
    /// Rows per expiration.
    #[serde(default)]
    pub expirations: BTreeMap<NaiveDate, Vec<ChainRow>>,
}

/// Chain file loading errors.
#[derive(Debug, Error)]
pub enum ChainFileError {
    /// File could not be read.
    #[error("Failed to read chain file {path}: {source}")]
    Io {
        /// Path tried.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// File is not a valid chain.
    #[error("Failed to parse chain file: {0}")]
    Parse(#[from] serde_yaml_bw::Error),

    /// Same contract listed twice.
    #[error("Duplicate chain row: {0}")]
    DuplicateRow(LegKey),
}

type Chain = BTreeMap<(Decimal, OptionRight), Quote>;

/// Quote source backed by an in-memory option chain.
#[derive(Debug)]
pub struct ChainQuoteSource {
    underlying: String,
    chains: BTreeMap<NaiveDate, Chain>,
    latency: Duration,
    connected: AtomicBool,
}

impl ChainQuoteSource {
    /// Build from parsed chain file contents.
    ///
    /// # Errors
    ///
    /// `DuplicateRow` if a contract appears twice under one expiration.
    pub fn new(file: ChainFile, latency: Duration) -> Result<Self, ChainFileError> {
        let mut chains = BTreeMap::new();
        for (expiration, rows) in file.expirations {
            let mut chain = Chain::new();
            for row in rows {
                let quote = Quote::new(row.bid, row.ask, row.delta);
                if chain.insert((row.strike, row.right), quote).is_some() {
                    return Err(ChainFileError::DuplicateRow(LegKey::new(
                        expiration, row.strike, row.right,
                    )));
                }
            }
            chains.insert(expiration, chain);
        }

        Ok(Self {
            underlying: file.underlying,
            chains,
            latency,
            connected: AtomicBool::new(true),
        })
    }

    /// Parse a chain from YAML.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed YAML, `DuplicateRow` for repeated contracts.
    pub fn from_yaml_str(yaml: &str, latency: Duration) -> Result<Self, ChainFileError> {
        let file: ChainFile = serde_yaml_bw::from_str(yaml)?;
        Self::new(file, latency)
    }

    /// Load a chain file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`Self::from_yaml_str`].
    pub fn from_file(path: impl AsRef<Path>, latency: Duration) -> Result<Self, ChainFileError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ChainFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let source = Self::from_yaml_str(&yaml, latency)?;
        tracing::info!(
            path = %path.display(),
            underlying = %source.underlying,
            expirations = source.chains.len(),
            "Loaded option chain"
        );
        Ok(source)
    }

    /// Underlying symbol.
    #[must_use]
    pub fn underlying(&self) -> &str {
        &self.underlying
    }

    /// Drop the session; fetches fail until [`Self::reconnect`].
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!(target: ACCESS_TARGET, underlying = %self.underlying, "session closed");
    }

    /// Restore the session.
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(target: ACCESS_TARGET, underlying = %self.underlying, "session opened");
    }

    fn ensure_connected(&self) -> Result<(), QuoteSourceError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(QuoteSourceError::ConnectionLost {
                message: format!("{} session closed", self.underlying),
            })
        }
    }
}

#[async_trait]
impl QuoteSourcePort for ChainQuoteSource {
    async fn fetch(&self, keys: &BTreeSet<LegKey>) -> Result<QuoteBatch, QuoteSourceError> {
        tokio::time::sleep(self.latency).await;
        self.ensure_connected()?;

        let mut batch = QuoteBatch::new();
        for key in keys {
            let chain = self
                .chains
                .get(&key.expiration)
                .ok_or(QuoteSourceError::ChainLookupFailed { key: *key })?;
            batch.insert(*key, chain.get(&(key.strike, key.right)).copied());
        }

        tracing::info!(
            target: ACCESS_TARGET,
            underlying = %self.underlying,
            keys = keys.len(),
            quoted = batch.values().filter(|q| q.is_some()).count(),
            "fetch"
        );
        Ok(batch)
    }

    async fn expirations(&self) -> Result<Vec<NaiveDate>, QuoteSourceError> {
        tokio::time::sleep(self.latency).await;
        self.ensure_connected()?;

        tracing::info!(
            target: ACCESS_TARGET,
            underlying = %self.underlying,
            "expirations"
        );
        Ok(self.chains.keys().copied().collect())
    }
}
