//! Application Services
//!
//! - [`RefreshCoordinator`]: single-flight, drain-to-latest refresh state machine
//! - [`QuoteWorker`]: task that owns the quote source session
//! - [`PositionBuilder`]: coordinating task tying the Leg Store, the
//!   coordinator, the worker and the presentation sink together

mod position_builder;
pub(crate) mod quote_worker;
mod refresh_coordinator;

pub use position_builder::{
    BuilderCommand, BuilderError, BuilderHandle, BuilderRuntime, PositionBuilder,
    PositionBuilderConfig, ResponseOutcome,
};
pub use quote_worker::{
    DispatchError, ExpirationsReply, QuoteResponse, QuoteWorker, QuoteWorkerHandle, normalize,
};
pub use refresh_coordinator::{
    Completion, Reconciliation, RefreshCoordinator, RefreshError, RefreshRequest, RefreshState,
    RefreshStats, RefreshTrigger, RequestId, Submission,
};
