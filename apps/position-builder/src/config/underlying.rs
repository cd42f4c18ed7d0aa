//! Underlying instrument configuration.

use serde::{Deserialize, Serialize};

/// Underlying the legs are written on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderlyingConfig {
    /// Ticker symbol.
    #[serde(default = "default_symbol")]
    pub symbol: String,
}

impl Default for UnderlyingConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
        }
    }
}

fn default_symbol() -> String {
    "SPX".to_string()
}
