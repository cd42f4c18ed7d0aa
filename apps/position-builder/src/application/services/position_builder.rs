//! Position Builder Service
//!
//! The coordinating task. Owns the Leg Store, the refresh state machine, the
//! status line and the presentation sink, and is the only place quotes are
//! written into legs.
//!
//! Every mutation runs synchronously against the store, publishes a snapshot,
//! then asks for a refresh. Quote responses come back as messages from the
//! [`QuoteWorker`](super::QuoteWorker) and are applied only when they cover
//! exactly the legs that exist now.
//!
//! Callers outside the task use a [`BuilderHandle`].

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    PresentationSink, QuoteSourceError, QuoteSourcePort, Snapshot, Status,
};
use crate::domain::position::{
    EditOutcome, LegAction, LegField, LegKey, LegStore, LegStoreError, Position,
};
use crate::domain::pricing::{PayoffCurve, PriceRange, Totals, payoff_curve_for};
use crate::observability::metrics;

use super::quote_worker::{
    DispatchError, ExpirationsReply, QuoteResponse, QuoteWorker, QuoteWorkerHandle,
};
use super::refresh_coordinator::{
    Reconciliation, RefreshCoordinator, RefreshError, RefreshRequest, RefreshStats,
    RefreshTrigger, Submission,
};

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const RESPONSE_CHANNEL_CAPACITY: usize = 4;

/// Configuration for the position builder.
#[derive(Debug, Clone)]
pub struct PositionBuilderConfig {
    /// Periodic refresh interval while legs exist.
    pub refresh_interval: Duration,
    /// Chart padding around the outermost strikes, as a fraction of strike.
    pub payoff_padding_ratio: f64,
    /// Chart grid intervals.
    pub payoff_steps: u32,
}

impl Default for PositionBuilderConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15),
            payoff_padding_ratio: 0.05,
            payoff_steps: 80,
        }
    }
}

/// Position builder errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// Leg operation rejected.
    #[error(transparent)]
    LegStore(#[from] LegStoreError),

    /// Quote source rejected a direct query.
    #[error(transparent)]
    QuoteSource(#[from] QuoteSourceError),

    /// Quote worker could not take the job.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Quote worker dropped the job without answering.
    #[error("quote worker unavailable")]
    WorkerUnavailable,

    /// Builder task has stopped.
    #[error("position builder has stopped")]
    Stopped,
}

/// How a quote response was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Quotes written to the legs.
    Applied,
    /// Legs changed since the request; quotes left alone.
    Discarded,
    /// Source reported an error; shown as status.
    Failed,
}

impl ResponseOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Discarded => "discarded",
            Self::Failed => "failed",
        }
    }
}

/// Position builder.
///
/// Synchronous core; [`PositionBuilder::run`] drives it from channels.
pub struct PositionBuilder<S: PresentationSink> {
    store: LegStore,
    coordinator: RefreshCoordinator,
    worker: QuoteWorkerHandle,
    sink: S,
    status: Status,
    config: PositionBuilderConfig,
}

impl<S: PresentationSink> PositionBuilder<S> {
    /// Create a builder with no legs.
    #[must_use]
    pub fn new(worker: QuoteWorkerHandle, sink: S, config: PositionBuilderConfig) -> Self {
        Self {
            store: LegStore::new(),
            coordinator: RefreshCoordinator::new(),
            worker,
            sink,
            status: Status::Ready,
            config,
        }
    }

    /// Current legs.
    #[must_use]
    pub fn position(&self) -> Position {
        self.store.position()
    }

    /// Status line.
    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    /// Refresh counters.
    #[must_use]
    pub const fn refresh_stats(&self) -> RefreshStats {
        self.coordinator.stats()
    }

    /// Check if a quote request is outstanding.
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        self.coordinator.is_dispatching()
    }

    /// Composite prices. Unknown while the last refresh is in error.
    #[must_use]
    pub fn totals(&self) -> Totals {
        if self.status.is_error() {
            Totals::unknown()
        } else {
            Totals::compute(&self.store.position())
        }
    }

    /// Everything the sink would see right now.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let position = self.store.position();
        let totals = if self.status.is_error() {
            Totals::unknown()
        } else {
            Totals::compute(&position)
        };
        let curve = self.curve(&position, &totals);
        Snapshot {
            position,
            totals,
            status: self.status.clone(),
            refreshing: self.coordinator.is_dispatching(),
            curve,
        }
    }

    /// Add a leg and refresh.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if a leg with `key` exists.
    pub fn add(
        &mut self,
        action: LegAction,
        multiplier: NonZeroU32,
        key: LegKey,
    ) -> Result<Position, BuilderError> {
        let position = self.store.add(action, multiplier, key)?;
        tracing::info!(leg = %key, %action, multiplier = multiplier.get(), "Leg added");
        self.request_refresh(RefreshTrigger::Mutation);
        self.publish();
        Ok(position)
    }

    /// Remove a leg; refresh if any remain.
    ///
    /// # Errors
    ///
    /// `NotFound` if no leg has `key`.
    pub fn remove(&mut self, key: &LegKey) -> Result<Position, BuilderError> {
        let position = self.store.remove(key)?;
        tracing::info!(leg = %key, "Leg removed");
        self.after_key_change();
        self.publish();
        Ok(position)
    }

    /// Remove every leg.
    pub fn clear(&mut self) -> Position {
        let position = self.store.clear();
        tracing::info!("Position cleared");
        self.after_key_change();
        self.publish();
        position
    }

    /// Edit one field of a leg. Key changes refresh.
    ///
    /// # Errors
    ///
    /// `NotFound` if no leg has `key`.
    pub fn edit(
        &mut self,
        key: &LegKey,
        field: LegField,
    ) -> Result<(Position, EditOutcome), BuilderError> {
        let (position, outcome) = self.store.edit(key, field)?;
        match outcome {
            EditOutcome::Updated | EditOutcome::Unchanged => {
                tracing::debug!(leg = %key, ?outcome, "Leg edited");
            }
            EditOutcome::Rekeyed { key: new_key } => {
                tracing::info!(from = %key, to = %new_key, "Leg rekeyed");
            }
            EditOutcome::Merged { into } => {
                tracing::info!(from = %key, into = %into, "Leg merged into existing leg");
            }
        }
        if outcome.changes_keys() {
            self.after_key_change();
        }
        self.publish();
        Ok((position, outcome))
    }

    /// Manual refresh. Returns `false` when there are no legs to quote.
    pub fn refresh(&mut self) -> bool {
        let requested = self.request_refresh(RefreshTrigger::Manual);
        self.publish();
        requested
    }

    /// Periodic tick.
    pub fn on_tick(&mut self) {
        if self.request_refresh(RefreshTrigger::Periodic) {
            self.publish();
        }
    }

    /// Reconcile a worker response against the current legs.
    ///
    /// # Errors
    ///
    /// `UnexpectedResponse` if the response is not for the in-flight request;
    /// nothing changes.
    pub fn handle_response(
        &mut self,
        response: QuoteResponse,
    ) -> Result<ResponseOutcome, RefreshError> {
        let completion = self.coordinator.complete(response.request_id)?;

        let outcome = match response.result {
            Ok(batch) => {
                let current = self.store.key_set();
                match self.coordinator.reconcile(&response.target_keys, &current) {
                    Reconciliation::Apply => {
                        self.store.apply_quotes(&batch);
                        self.status = Status::Ready;
                        tracing::debug!(
                            request_id = response.request_id,
                            legs = current.len(),
                            "Quotes applied"
                        );
                        ResponseOutcome::Applied
                    }
                    Reconciliation::Discard => {
                        tracing::debug!(
                            request_id = response.request_id,
                            requested = response.target_keys.len(),
                            current = current.len(),
                            "Discarded stale quote response"
                        );
                        ResponseOutcome::Discarded
                    }
                }
            }
            Err(e) => {
                self.coordinator.record_failure();
                tracing::warn!(request_id = response.request_id, error = %e, "Quote refresh failed");
                self.status = Status::Error(e.to_string());
                ResponseOutcome::Failed
            }
        };
        metrics::record_quote_response(outcome.as_str());

        if let Some(next) = completion.next {
            tracing::debug!(request_id = next.id(), "Dispatching pending refresh");
            self.dispatch(next);
        }

        self.publish();
        Ok(outcome)
    }

    /// Ask the worker for the available expirations.
    ///
    /// The answer goes to `reply` directly, including the error when the
    /// worker cannot take the job.
    pub fn list_expirations(&self, reply: ExpirationsReply) {
        if let Err(e) = self.worker.list_expirations(reply) {
            tracing::warn!(error = %e, "Could not queue expiration listing");
        }
    }

    /// Drive the builder until cancelled or every command sender is dropped.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<BuilderCommand>,
        mut responses: mpsc::Receiver<QuoteResponse>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick fires immediately; the position is empty anyway
        ticker.tick().await;

        tracing::info!(
            interval_secs = self.config.refresh_interval.as_secs(),
            "Position builder started"
        );
        self.publish();

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::info!("Position builder shutting down");
                    break;
                }
                Some(response) = responses.recv() => {
                    if let Err(e) = self.handle_response(response) {
                        tracing::warn!(error = %e, "Ignored quote response");
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        tracing::info!("All builder handles dropped");
                        break;
                    }
                },
                _ = ticker.tick() => self.on_tick(),
            }
        }
    }

    fn handle_command(&mut self, command: BuilderCommand) {
        // a dropped reply receiver means the caller stopped waiting
        match command {
            BuilderCommand::Add {
                action,
                multiplier,
                key,
                reply,
            } => {
                let _ = reply.send(self.add(action, multiplier, key));
            }
            BuilderCommand::Remove { key, reply } => {
                let _ = reply.send(self.remove(&key));
            }
            BuilderCommand::Edit { key, field, reply } => {
                let _ = reply.send(self.edit(&key, field));
            }
            BuilderCommand::Clear { reply } => {
                let _ = reply.send(self.clear());
            }
            BuilderCommand::Refresh { reply } => {
                let _ = reply.send(self.refresh());
            }
            BuilderCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            BuilderCommand::Expirations { reply } => self.list_expirations(reply),
        }
    }

    fn after_key_change(&mut self) {
        if self.store.is_empty() {
            if let Some(dropped) = self.coordinator.clear_pending() {
                tracing::debug!(request_id = dropped.id(), "Dropped pending refresh, no legs left");
            }
        } else {
            self.request_refresh(RefreshTrigger::Mutation);
        }
    }

    fn request_refresh(&mut self, trigger: RefreshTrigger) -> bool {
        if self.store.is_empty() {
            return false;
        }
        metrics::record_refresh_request(trigger.as_str());

        match self.coordinator.request_refresh(self.store.key_set(), trigger) {
            Submission::Dispatch(request) => {
                tracing::debug!(
                    request_id = request.id(),
                    %trigger,
                    keys = request.target_keys().len(),
                    "Dispatching refresh"
                );
                self.dispatch(request);
            }
            Submission::Queued { superseded } => {
                if superseded.is_some() {
                    metrics::record_refresh_superseded();
                }
                tracing::debug!(%trigger, ?superseded, "Refresh queued behind in-flight request");
            }
        }
        true
    }

    fn dispatch(&mut self, request: RefreshRequest) {
        if let Err(e) = self.worker.dispatch(request) {
            let aborted = self.coordinator.abort();
            tracing::warn!(
                error = %e,
                request_id = aborted.as_ref().map(RefreshRequest::id),
                "Could not hand refresh to quote worker"
            );
            self.status = Status::Error(e.to_string());
        }
    }

    fn curve(&self, position: &Position, totals: &Totals) -> Option<PayoffCurve> {
        if !totals.lazy.is_known() {
            return None;
        }
        match PriceRange::around_strikes(
            position,
            self.config.payoff_padding_ratio,
            self.config.payoff_steps,
        ) {
            Ok(range) => range.and_then(|range| payoff_curve_for(position, range)),
            Err(e) => {
                tracing::warn!(error = %e, "Payoff chart range rejected");
                None
            }
        }
    }

    fn publish(&self) {
        self.sink.on_snapshot(&self.snapshot());
    }
}

/// Messages from a [`BuilderHandle`] to the builder task.
#[derive(Debug)]
pub enum BuilderCommand {
    /// Add a leg.
    Add {
        /// Buy or sell.
        action: LegAction,
        /// Contract count.
        multiplier: NonZeroU32,
        /// Leg identity.
        key: LegKey,
        /// Result slot.
        reply: oneshot::Sender<Result<Position, BuilderError>>,
    },
    /// Remove a leg.
    Remove {
        /// Leg to remove.
        key: LegKey,
        /// Result slot.
        reply: oneshot::Sender<Result<Position, BuilderError>>,
    },
    /// Edit one field of a leg.
    Edit {
        /// Leg to edit.
        key: LegKey,
        /// New value.
        field: LegField,
        /// Result slot.
        reply: oneshot::Sender<Result<(Position, EditOutcome), BuilderError>>,
    },
    /// Remove every leg.
    Clear {
        /// Result slot.
        reply: oneshot::Sender<Position>,
    },
    /// Manual refresh.
    Refresh {
        /// Whether a request was made.
        reply: oneshot::Sender<bool>,
    },
    /// Current snapshot.
    Snapshot {
        /// Result slot.
        reply: oneshot::Sender<Snapshot>,
    },
    /// Expirations from the quote source.
    Expirations {
        /// Answered by the worker.
        reply: ExpirationsReply,
    },
}

/// Cloneable client for a running builder.
#[derive(Debug, Clone)]
pub struct BuilderHandle {
    commands: mpsc::Sender<BuilderCommand>,
}

impl BuilderHandle {
    /// Wrap a command sender.
    #[must_use]
    pub const fn new(commands: mpsc::Sender<BuilderCommand>) -> Self {
        Self { commands }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> BuilderCommand,
    ) -> Result<T, BuilderError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| BuilderError::Stopped)?;
        rx.await.map_err(|_| BuilderError::Stopped)
    }

    /// Add a leg.
    ///
    /// # Errors
    ///
    /// `DuplicateKey`, or `Stopped` if the builder is gone.
    pub async fn add(
        &self,
        action: LegAction,
        multiplier: NonZeroU32,
        key: LegKey,
    ) -> Result<Position, BuilderError> {
        self.request(|reply| BuilderCommand::Add {
            action,
            multiplier,
            key,
            reply,
        })
        .await?
    }

    /// Remove a leg.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Stopped` if the builder is gone.
    pub async fn remove(&self, key: LegKey) -> Result<Position, BuilderError> {
        self.request(|reply| BuilderCommand::Remove { key, reply })
            .await?
    }

    /// Edit one field of a leg.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Stopped` if the builder is gone.
    pub async fn edit(
        &self,
        key: LegKey,
        field: LegField,
    ) -> Result<(Position, EditOutcome), BuilderError> {
        self.request(|reply| BuilderCommand::Edit { key, field, reply })
            .await?
    }

    /// Remove every leg.
    ///
    /// # Errors
    ///
    /// `Stopped` if the builder is gone.
    pub async fn clear(&self) -> Result<Position, BuilderError> {
        self.request(|reply| BuilderCommand::Clear { reply }).await
    }

    /// Manual refresh.
    ///
    /// # Errors
    ///
    /// `Stopped` if the builder is gone.
    pub async fn refresh(&self) -> Result<bool, BuilderError> {
        self.request(|reply| BuilderCommand::Refresh { reply }).await
    }

    /// Current snapshot.
    ///
    /// # Errors
    ///
    /// `Stopped` if the builder is gone.
    pub async fn snapshot(&self) -> Result<Snapshot, BuilderError> {
        self.request(|reply| BuilderCommand::Snapshot { reply })
            .await
    }

    /// Expirations the quote source can price.
    ///
    /// # Errors
    ///
    /// The source's error, `Dispatch` if the worker could not take the job,
    /// `WorkerUnavailable` if it dropped the job, or `Stopped` if the builder
    /// is gone.
    pub async fn expirations(&self) -> Result<Vec<NaiveDate>, BuilderError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(BuilderCommand::Expirations { reply: tx })
            .await
            .map_err(|_| BuilderError::Stopped)?;
        rx.await.map_err(|_| BuilderError::WorkerUnavailable)?
    }
}

/// A builder task and its quote worker.
#[derive(Debug)]
pub struct BuilderRuntime {
    handle: BuilderHandle,
    task: JoinHandle<()>,
    worker: QuoteWorker,
    cancel: CancellationToken,
}

impl BuilderRuntime {
    /// Spawn the quote worker and the builder task on the current runtime.
    #[must_use]
    pub fn start<S>(
        source: Arc<dyn QuoteSourcePort>,
        sink: S,
        config: PositionBuilderConfig,
        cancel: CancellationToken,
    ) -> Self
    where
        S: PresentationSink + 'static,
    {
        let (response_tx, response_rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let worker = QuoteWorker::spawn(source, response_tx, cancel.child_token());
        let builder = PositionBuilder::new(worker.handle(), sink, config);
        let task = tokio::spawn(builder.run(command_rx, response_rx, cancel.child_token()));

        Self {
            handle: BuilderHandle::new(command_tx),
            task,
            worker,
            cancel,
        }
    }

    /// Client for the builder task.
    #[must_use]
    pub fn handle(&self) -> BuilderHandle {
        self.handle.clone()
    }

    /// Cancel both tasks and wait for them.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.handle);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Position builder task failed");
        }
        self.worker.join().await;
    }
}
