//! Position Builder Binary
//!
//! Interactive console for building a multi-leg options position against an
//! option chain file.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin position-builder -- --config config.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `POSITION_BUILDER_CONFIG`: config file path when `--config` is not given
//! - `RUST_LOG`: log filter (overrides `observability.logging.level`)
//!
//! Config values may reference any variable with `${VAR}` or `${VAR:-default}`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use position_builder::application::services::{BuilderRuntime, PositionBuilderConfig};
use position_builder::config::{Config, ConfigOrigin, load_config_or_default};
use position_builder::infrastructure::cli::{Args, run_repl};
use position_builder::infrastructure::presentation::ConsoleSink;
use position_builder::infrastructure::quote_source::ChainQuoteSource;
use position_builder::observability::{MetricsConfig, init_metrics};
use position_builder::telemetry::init_tracing;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// How long to wait for blocking tasks at exit. A pending stdin read
/// never finishes on its own.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}

async fn run() -> anyhow::Result<()> {
    load_dotenv();

    let args = Args::parse();
    let (config, origin) = load_config_or_default(args.config.as_deref())?;
    init_tracing(&config.observability.logging)?;

    match &origin {
        ConfigOrigin::File(path) => tracing::info!(path = %path, "Configuration loaded"),
        ConfigOrigin::Defaults(path) => {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }
    }
    log_config(&config);

    if config.observability.metrics.enabled {
        let addr = config.metrics_addr()?;
        init_metrics(&MetricsConfig::with_addr(addr)).context("starting metrics exporter")?;
    }

    let source = ChainQuoteSource::from_file(
        &config.quote_source.chain_file,
        config.quote_source.latency(),
    )
    .with_context(|| format!("loading option chain {}", config.quote_source.chain_file))?;

    if source.underlying() != config.underlying.symbol {
        tracing::warn!(
            configured = %config.underlying.symbol,
            chain = %source.underlying(),
            "Chain file underlying differs from configured symbol"
        );
    }

    let shutdown_token = CancellationToken::new();
    let runtime = BuilderRuntime::start(
        Arc::new(source),
        ConsoleSink::stdout(),
        builder_config(&config),
        shutdown_token.child_token(),
    );

    tracing::info!(symbol = %config.underlying.symbol, "Position builder ready");
    println!("Position builder for {} (type `help`)", config.underlying.symbol);

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let repl = run_repl(
        runtime.handle(),
        stdin,
        std::io::stdout(),
        shutdown_token.clone(),
    );

    let result = tokio::select! {
        result = repl => result,
        () = shutdown_signal() => Ok(()),
    };

    shutdown_token.cancel();
    runtime.shutdown().await;

    tracing::info!("Position builder stopped");
    result
}

fn builder_config(config: &Config) -> PositionBuilderConfig {
    PositionBuilderConfig {
        refresh_interval: config.refresh.interval(),
        payoff_padding_ratio: config.payoff.padding_ratio,
        payoff_steps: config.payoff.steps,
    }
}

/// Log the effective configuration.
fn log_config(config: &Config) {
    tracing::info!(
        symbol = %config.underlying.symbol,
        refresh_interval_secs = config.refresh.interval_secs,
        chain_file = %config.quote_source.chain_file,
        latency_ms = config.quote_source.latency_ms,
        metrics_enabled = config.observability.metrics.enabled,
        "Configuration"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
