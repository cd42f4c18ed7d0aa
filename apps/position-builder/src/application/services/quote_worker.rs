//! Quote Worker
//!
//! Background task that owns the quote source session. Every call to the
//! source goes through here, one at a time, so the broker never sees two
//! concurrent requests from this process.
//!
//! The worker never touches the Leg Store. It answers fetches with a
//! [`QuoteResponse`] message on the response channel and leaves
//! reconciliation to the builder.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{QuoteBatch, QuoteSourceError, QuoteSourcePort};
use crate::domain::position::LegKey;
use crate::observability::metrics;

use super::position_builder::BuilderError;
use super::refresh_coordinator::{RefreshRequest, RequestId};

/// Fetches the worker can hold. The coordinator keeps at most one fetch
/// outstanding, so this never fills while it holds to that.
const FETCH_QUEUE_CAPACITY: usize = 1;

/// Expiration listings the worker can hold before `try_send` reports it busy.
/// Listings have their own queue so they never crowd out a fetch.
pub(crate) const LISTING_QUEUE_CAPACITY: usize = 4;

/// Reply slot for an expiration listing.
pub type ExpirationsReply = oneshot::Sender<Result<Vec<NaiveDate>, BuilderError>>;

/// Result of one fetch, sent back to the coordinating task.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResponse {
    /// Id of the request this answers.
    pub request_id: RequestId,
    /// Keys the request asked for; the batch covers exactly these.
    pub target_keys: BTreeSet<LegKey>,
    /// Quotes or the source's error.
    pub result: Result<QuoteBatch, QuoteSourceError>,
}

#[derive(Debug)]
enum WorkerJob {
    Fetch(RefreshRequest),
    Expirations(ExpirationsReply),
}

/// Worker hand-off errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Worker task has stopped.
    #[error("quote worker unavailable")]
    WorkerGone,

    /// Worker queue is full.
    #[error("quote worker busy")]
    Busy,
}

impl<T> From<&mpsc::error::TrySendError<T>> for DispatchError {
    fn from(err: &mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => Self::Busy,
            mpsc::error::TrySendError::Closed(_) => Self::WorkerGone,
        }
    }
}

/// Receiving ends of a worker's queues.
#[derive(Debug)]
pub(crate) struct WorkerQueues {
    pub(crate) fetches: mpsc::Receiver<RefreshRequest>,
    pub(crate) listings: mpsc::Receiver<ExpirationsReply>,
}

/// Cloneable sender side of the worker.
#[derive(Debug, Clone)]
pub struct QuoteWorkerHandle {
    fetches: mpsc::Sender<RefreshRequest>,
    listings: mpsc::Sender<ExpirationsReply>,
}

impl QuoteWorkerHandle {
    fn channel() -> (Self, WorkerQueues) {
        let (fetch_tx, fetch_rx) = mpsc::channel(FETCH_QUEUE_CAPACITY);
        let (listing_tx, listing_rx) = mpsc::channel(LISTING_QUEUE_CAPACITY);
        (
            Self {
                fetches: fetch_tx,
                listings: listing_tx,
            },
            WorkerQueues {
                fetches: fetch_rx,
                listings: listing_rx,
            },
        )
    }

    /// Hand a fetch to the worker without waiting.
    ///
    /// # Errors
    ///
    /// `WorkerGone` if the worker has stopped, `Busy` if a fetch is already
    /// waiting to be picked up.
    pub fn dispatch(&self, request: RefreshRequest) -> Result<(), DispatchError> {
        self.fetches
            .try_send(request)
            .map_err(|e| DispatchError::from(&e))
    }

    /// Queue an expiration listing; the answer goes straight to `reply`.
    ///
    /// When the listing cannot be queued, `reply` receives the same error.
    ///
    /// # Errors
    ///
    /// `WorkerGone` if the worker has stopped, `Busy` if its listing queue
    /// is full.
    pub fn list_expirations(&self, reply: ExpirationsReply) -> Result<(), DispatchError> {
        self.listings.try_send(reply).map_err(|e| {
            let error = DispatchError::from(&e);
            // caller may have given up waiting
            let _ = e.into_inner().send(Err(BuilderError::Dispatch(error.clone())));
            error
        })
    }

    /// Check if the worker task is still receiving.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.fetches.is_closed()
    }

    /// Handle with no task behind it; the test reads jobs off the queues.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, WorkerQueues) {
        Self::channel()
    }
}

/// Background quote worker.
#[derive(Debug)]
pub struct QuoteWorker {
    handle: QuoteWorkerHandle,
    task: JoinHandle<()>,
}

impl QuoteWorker {
    /// Spawn the worker on the current runtime.
    ///
    /// The worker stops when `cancel` fires or every handle is dropped.
    #[must_use]
    pub fn spawn(
        source: Arc<dyn QuoteSourcePort>,
        responses: mpsc::Sender<QuoteResponse>,
        cancel: CancellationToken,
    ) -> Self {
        let (handle, queues) = QuoteWorkerHandle::channel();
        let task = tokio::spawn(run(source, queues, responses, cancel));
        Self { handle, task }
    }

    /// Sender side.
    #[must_use]
    pub fn handle(&self) -> QuoteWorkerHandle {
        self.handle.clone()
    }

    /// Drop this handle and wait for the task to finish.
    ///
    /// The task exits once `cancel` fires or every other handle is dropped.
    pub async fn join(self) {
        drop(self.handle);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Quote worker task failed");
        }
    }
}

async fn run(
    source: Arc<dyn QuoteSourcePort>,
    mut queues: WorkerQueues,
    responses: mpsc::Sender<QuoteResponse>,
    cancel: CancellationToken,
) {
    tracing::debug!("Quote worker started");

    loop {
        // fetches first; a listing never delays a refresh
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = queues.fetches.recv() => match request {
                Some(request) => WorkerJob::Fetch(request),
                None => break,
            },
            Some(reply) = queues.listings.recv() => WorkerJob::Expirations(reply),
        };

        match job {
            WorkerJob::Fetch(request) => {
                let response = tokio::select! {
                    () = cancel.cancelled() => break,
                    response = fetch(source.as_ref(), request) => response,
                };
                if responses.send(response).await.is_err() {
                    tracing::debug!("Response channel closed, stopping quote worker");
                    break;
                }
            }
            WorkerJob::Expirations(reply) => {
                let result = tokio::select! {
                    () = cancel.cancelled() => break,
                    result = source.expirations() => result,
                };
                // caller may have given up waiting
                let _ = reply.send(result.map_err(BuilderError::from));
            }
        }
    }

    tracing::debug!("Quote worker stopped");
}

async fn fetch(source: &dyn QuoteSourcePort, request: RefreshRequest) -> QuoteResponse {
    let started = Instant::now();
    let result = source.fetch(request.target_keys()).await;
    metrics::record_quote_fetch_latency(started.elapsed().as_secs_f64());

    let result = match result {
        Ok(batch) => Ok(normalize(batch, request.target_keys())),
        Err(e) => {
            metrics::record_quote_source_failure(e.kind());
            tracing::warn!(
                request_id = request.id(),
                error = %e,
                "Quote fetch failed"
            );
            Err(e)
        }
    };

    tracing::debug!(
        request_id = request.id(),
        keys = request.target_keys().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Quote fetch finished"
    );

    QuoteResponse {
        request_id: request.id(),
        target_keys: request.target_keys().clone(),
        result,
    }
}

/// Shape a batch to exactly `target`: missing keys become `None`, extras
/// are dropped.
#[must_use]
pub fn normalize(mut batch: QuoteBatch, target: &BTreeSet<LegKey>) -> QuoteBatch {
    let normalized: QuoteBatch = target
        .iter()
        .map(|key| (*key, batch.remove(key).flatten()))
        .collect();
    if !batch.is_empty() {
        tracing::debug!(extra = batch.len(), "Dropped quotes for keys not requested");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::refresh_coordinator::{
        RefreshCoordinator, RefreshTrigger, Submission,
    };
    use crate::domain::position::Quote;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn march() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    fn request(keys: BTreeSet<LegKey>) -> RefreshRequest {
        match RefreshCoordinator::new().request_refresh(keys, RefreshTrigger::Manual) {
            Submission::Dispatch(request) => request,
            Submission::Queued { .. } => unreachable!(),
        }
    }

    /// Quotes every key at 1.0/1.5 and adds one key nobody asked for.
    struct Generous;

    #[async_trait]
    impl QuoteSourcePort for Generous {
        async fn fetch(&self, keys: &BTreeSet<LegKey>) -> Result<QuoteBatch, QuoteSourceError> {
            let mut batch: QuoteBatch = keys
                .iter()
                .map(|k| (*k, Some(Quote::two_sided(1.0, 1.5))))
                .collect();
            batch.insert(LegKey::put(march(), dec!(1)), None);
            Ok(batch)
        }

        async fn expirations(&self) -> Result<Vec<NaiveDate>, QuoteSourceError> {
            Ok(vec![march()])
        }
    }

    struct Disconnected;

    #[async_trait]
    impl QuoteSourcePort for Disconnected {
        async fn fetch(&self, _keys: &BTreeSet<LegKey>) -> Result<QuoteBatch, QuoteSourceError> {
            Err(QuoteSourceError::ConnectionLost {
                message: "timeout".to_string(),
            })
        }

        async fn expirations(&self) -> Result<Vec<NaiveDate>, QuoteSourceError> {
            Err(QuoteSourceError::ConnectionLost {
                message: "timeout".to_string(),
            })
        }
    }

    #[test]
    fn normalize_fills_missing_and_drops_extra() {
        let a = LegKey::call(march(), dec!(5000));
        let b = LegKey::call(march(), dec!(5050));
        let extra = LegKey::put(march(), dec!(4900));

        let batch = QuoteBatch::from([
            (a, Some(Quote::two_sided(10.0, 10.5))),
            (extra, Some(Quote::two_sided(1.0, 1.1))),
        ]);
        let target = BTreeSet::from([a, b]);

        let normalized = normalize(batch, &target);
        assert_eq!(normalized.keys().copied().collect::<BTreeSet<_>>(), target);
        assert_eq!(normalized[&a], Some(Quote::two_sided(10.0, 10.5)));
        assert_eq!(normalized[&b], None);
    }

    #[tokio::test]
    async fn worker_answers_with_normalized_batch() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let worker = QuoteWorker::spawn(Arc::new(Generous), tx, cancel.clone());

        let keys = BTreeSet::from([LegKey::call(march(), dec!(5000))]);
        let request = request(keys.clone());
        worker.handle().dispatch(request.clone()).unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.request_id, request.id());
        assert_eq!(response.target_keys, keys);
        let batch = response.result.unwrap();
        assert_eq!(batch.keys().copied().collect::<BTreeSet<_>>(), keys);

        cancel.cancel();
        worker.join().await;
    }

    #[tokio::test]
    async fn worker_forwards_source_errors() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let worker = QuoteWorker::spawn(Arc::new(Disconnected), tx, cancel.clone());

        let keys = BTreeSet::from([LegKey::call(march(), dec!(5000))]);
        worker.handle().dispatch(request(keys)).unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(
            response.result,
            Err(QuoteSourceError::ConnectionLost {
                message: "timeout".to_string()
            })
        );

        let (reply, answer) = oneshot::channel();
        worker.handle().list_expirations(reply).unwrap();
        assert!(answer.await.unwrap().is_err());

        cancel.cancel();
        worker.join().await;
    }

    #[tokio::test]
    async fn expirations_go_through_worker() {
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let worker = QuoteWorker::spawn(Arc::new(Generous), tx, cancel.clone());

        let (reply, answer) = oneshot::channel();
        worker.handle().list_expirations(reply).unwrap();
        assert_eq!(answer.await.unwrap(), Ok(vec![march()]));

        cancel.cancel();
        worker.join().await;
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_reports_worker_gone() {
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let worker = QuoteWorker::spawn(Arc::new(Generous), tx, cancel.clone());
        let handle = worker.handle();

        cancel.cancel();
        worker.join().await;

        assert!(!handle.is_running());
        let keys = BTreeSet::from([LegKey::call(march(), dec!(5000))]);
        assert_eq!(handle.dispatch(request(keys)), Err(DispatchError::WorkerGone));
    }

    #[test]
    fn full_listing_queue_leaves_room_for_fetch() {
        let (handle, mut queues) = QuoteWorkerHandle::detached();
        let mut pending = Vec::new();
        for _ in 0..LISTING_QUEUE_CAPACITY {
            let (reply, answer) = oneshot::channel();
            handle.list_expirations(reply).unwrap();
            pending.push(answer);
        }

        let keys = BTreeSet::from([LegKey::call(march(), dec!(5000))]);
        let request = request(keys);
        handle.dispatch(request.clone()).unwrap();
        assert_eq!(queues.fetches.try_recv().unwrap(), request);
        assert_eq!(pending.len(), LISTING_QUEUE_CAPACITY);
    }

    #[test]
    fn rejected_listing_answers_with_dispatch_error() {
        let (handle, _queues) = QuoteWorkerHandle::detached();
        for _ in 0..LISTING_QUEUE_CAPACITY {
            let (reply, _answer) = oneshot::channel();
            handle.list_expirations(reply).unwrap();
        }

        let (reply, mut answer) = oneshot::channel();
        assert_eq!(handle.list_expirations(reply), Err(DispatchError::Busy));
        assert_eq!(
            answer.try_recv().unwrap(),
            Err(BuilderError::Dispatch(DispatchError::Busy))
        );
    }

    #[tokio::test]
    async fn listing_after_shutdown_answers_worker_gone() {
        let (tx, _rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let worker = QuoteWorker::spawn(Arc::new(Generous), tx, cancel.clone());
        let handle = worker.handle();

        cancel.cancel();
        worker.join().await;

        let (reply, answer) = oneshot::channel();
        assert_eq!(handle.list_expirations(reply), Err(DispatchError::WorkerGone));
        assert_eq!(
            answer.await.unwrap(),
            Err(BuilderError::Dispatch(DispatchError::WorkerGone))
        );
    }
}
