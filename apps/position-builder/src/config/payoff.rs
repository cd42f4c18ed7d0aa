//! Payoff chart configuration.

use serde::{Deserialize, Serialize};

/// Payoff chart window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoffConfig {
    /// Padding around the outermost strikes, as a fraction of strike.
    #[serde(default = "default_padding_ratio")]
    pub padding_ratio: f64,
    /// Grid intervals across the window.
    #[serde(default = "default_steps")]
    pub steps: u32,
}

impl Default for PayoffConfig {
    fn default() -> Self {
        Self {
            padding_ratio: default_padding_ratio(),
            steps: default_steps(),
        }
    }
}

const fn default_padding_ratio() -> f64 {
    0.05
}

const fn default_steps() -> u32 {
    80
}
