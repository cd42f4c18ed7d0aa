//! Quote source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Option chain quote source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSourceConfig {
    /// Path to the chain YAML file.
    #[serde(default = "default_chain_file")]
    pub chain_file: String,
    /// Simulated round trip per call, in milliseconds.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            chain_file: default_chain_file(),
            latency_ms: default_latency_ms(),
        }
    }
}

impl QuoteSourceConfig {
    /// Latency as a duration.
    #[must_use]
    pub const fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

fn default_chain_file() -> String {
    "fixtures/chain.yaml".to_string()
}

const fn default_latency_ms() -> u64 {
    250
}
