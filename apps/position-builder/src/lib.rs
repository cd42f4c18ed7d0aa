// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Position Builder - Rust Core Library
//!
//! Interactive builder for multi-leg options positions. The user composes
//! legs; quotes are refreshed through a single broker session; the position
//! is priced as a whole and its payoff at expiration is charted.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic, no I/O
//!   - `position`: Leg identity, the Leg Store, position snapshots
//!   - `pricing`: Lazy and smart composite prices, net delta, payoff curve
//!
//! - **Application**: Orchestration
//!   - `ports`: `QuoteSourcePort`, `PresentationSink`
//!   - `services`: `RefreshCoordinator`, `QuoteWorker`, `PositionBuilder`
//!
//! - **Infrastructure**: Adapters
//!   - `quote_source`: option chain file, scripted mock
//!   - `presentation`: console renderer, recording sink
//!   - `cli`: command console
//!
//! # Concurrency
//!
//! One coordinating task owns all mutable state. One worker task owns the
//! quote source session and serves at most one request at a time. Responses
//! come back over a channel and are reconciled against the live position.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Services and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Prometheus metrics.
pub mod observability;

/// Tracing subscriber setup.
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::position::{
    EditOutcome, Leg, LegAction, LegField, LegKey, LegStore, LegStoreError, OptionRight, Position,
    Quote,
};
pub use domain::pricing::{PayoffCurve, PayoffPoint, PriceRange, Total, Totals};

// Application re-exports
pub use application::ports::{PresentationSink, QuoteSourceError, QuoteSourcePort, Snapshot, Status};
pub use application::services::{
    BuilderError, BuilderHandle, BuilderRuntime, PositionBuilder, PositionBuilderConfig,
    RefreshCoordinator, RefreshTrigger,
};

// Config re-exports
pub use config::{Config, ConfigError, ConfigOrigin, load_config, load_config_or_default};
