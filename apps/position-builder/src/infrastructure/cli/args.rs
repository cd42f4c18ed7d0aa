//! Process arguments.

use clap::Parser;

/// Interactive multi-leg options position builder.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "position-builder", version, about)]
pub struct Args {
    /// Path to configuration file (default: config.yaml)
    #[arg(short, long, env = "POSITION_BUILDER_CONFIG")]
    pub config: Option<String>,
}
