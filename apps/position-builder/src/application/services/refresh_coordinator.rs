//! Refresh Coordinator
//!
//! State machine that keeps at most one quote request in flight against the
//! worker. Requests that arrive while one is outstanding overwrite a single
//! pending slot, so a burst of edits costs one extra fetch, not one per edit.
//!
//! ```text
//!            request_refresh
//!   Idle ────────────────────────▶ Dispatching(in_flight)
//!    ▲                                 │  ▲   request_refresh
//!    │ complete, no pending            │  └── (overwrites pending)
//!    └─────────────────────────────────┤
//!                                      │ complete, pending set
//!                                      └──▶ Dispatching(pending)
//! ```
//!
//! The coordinator does no I/O. It hands out requests to dispatch and the
//! caller sends them; [`RefreshCoordinator::abort`] rolls back when the send
//! fails.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::domain::position::LegKey;

/// Monotonic request counter.
pub type RequestId = u64;

/// What asked for the refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
    /// User pressed refresh.
    Manual,
    /// Interval tick.
    Periodic,
    /// Leg add / remove / key change / clear.
    Mutation,
}

impl RefreshTrigger {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Periodic => "periodic",
            Self::Mutation => "mutation",
        }
    }
}

impl std::fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of which legs to quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    id: RequestId,
    target_keys: BTreeSet<LegKey>,
    trigger: RefreshTrigger,
}

impl RefreshRequest {
    /// Request id; later requests have larger ids.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Keys to quote.
    #[must_use]
    pub const fn target_keys(&self) -> &BTreeSet<LegKey> {
        &self.target_keys
    }

    /// What asked for it.
    #[must_use]
    pub const fn trigger(&self) -> RefreshTrigger {
        self.trigger
    }
}

/// Coordinator state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshState {
    /// Nothing outstanding.
    #[default]
    Idle,
    /// One request handed to the worker.
    Dispatching {
        /// The outstanding request.
        in_flight: RefreshRequest,
    },
}

/// Result of [`RefreshCoordinator::request_refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Send this to the worker now.
    Dispatch(RefreshRequest),
    /// Parked in the pending slot.
    Queued {
        /// Pending request this one replaced, if any.
        superseded: Option<RequestId>,
    },
}

/// Result of [`RefreshCoordinator::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The request that just finished.
    pub finished: RefreshRequest,
    /// Pending request promoted to in flight; send it to the worker.
    pub next: Option<RefreshRequest>,
}

/// Whether a response may be applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Response covers exactly the current legs.
    Apply,
    /// Position changed since the request was issued.
    Discard,
}

impl Reconciliation {
    /// Compare a response's keys against the store's current keys.
    ///
    /// Only exact set equality applies. A subset or superset means the legs
    /// changed under the request and its quotes may belong to other legs.
    #[must_use]
    pub fn decide(response_keys: &BTreeSet<LegKey>, current_keys: &BTreeSet<LegKey>) -> Self {
        if response_keys == current_keys {
            Self::Apply
        } else {
            Self::Discard
        }
    }
}

/// Coordinator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshStats {
    /// Requests handed to the worker.
    pub dispatched: u64,
    /// Pending requests overwritten before dispatch.
    pub superseded: u64,
    /// Responses applied to the store.
    pub applied: u64,
    /// Responses discarded as stale.
    pub discarded: u64,
    /// Responses that carried a quote source error.
    pub failed: u64,
}

/// Refresh coordinator errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// A response arrived for a request that is not in flight.
    #[error("unexpected response for request {id} (in flight: {in_flight:?})")]
    UnexpectedResponse {
        /// Id carried by the response.
        id: RequestId,
        /// Id actually in flight.
        in_flight: Option<RequestId>,
    },
}

/// Single-flight refresh state machine with a drain-to-latest pending slot.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: RefreshState,
    pending: Option<RefreshRequest>,
    next_id: RequestId,
    stats: RefreshStats,
}

impl RefreshCoordinator {
    /// Create an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &RefreshState {
        &self.state
    }

    /// Check if a request is outstanding.
    #[must_use]
    pub const fn is_dispatching(&self) -> bool {
        matches!(self.state, RefreshState::Dispatching { .. })
    }

    /// Outstanding request.
    #[must_use]
    pub const fn in_flight(&self) -> Option<&RefreshRequest> {
        match &self.state {
            RefreshState::Idle => None,
            RefreshState::Dispatching { in_flight } => Some(in_flight),
        }
    }

    /// Request waiting for the in-flight one to finish.
    #[must_use]
    pub const fn pending(&self) -> Option<&RefreshRequest> {
        self.pending.as_ref()
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> RefreshStats {
        self.stats
    }

    /// Ask for quotes on `keys`.
    ///
    /// Idle: the request goes in flight and must be dispatched by the caller.
    /// Dispatching: the request replaces whatever was pending. The in-flight
    /// request is never cancelled.
    pub fn request_refresh(
        &mut self,
        keys: BTreeSet<LegKey>,
        trigger: RefreshTrigger,
    ) -> Submission {
        let request = self.issue(keys, trigger);
        match self.state {
            RefreshState::Idle => {
                self.start(request.clone());
                Submission::Dispatch(request)
            }
            RefreshState::Dispatching { .. } => {
                let superseded = self.pending.replace(request).map(|old| old.id);
                if superseded.is_some() {
                    self.stats.superseded += 1;
                }
                Submission::Queued { superseded }
            }
        }
    }

    /// Finish the in-flight request and promote the pending one, if any.
    ///
    /// # Errors
    ///
    /// `UnexpectedResponse` if `id` is not the in-flight request; state is
    /// left unchanged.
    pub fn complete(&mut self, id: RequestId) -> Result<Completion, RefreshError> {
        let finished = match &self.state {
            RefreshState::Dispatching { in_flight } if in_flight.id == id => in_flight.clone(),
            state => {
                return Err(RefreshError::UnexpectedResponse {
                    id,
                    in_flight: match state {
                        RefreshState::Dispatching { in_flight } => Some(in_flight.id),
                        RefreshState::Idle => None,
                    },
                });
            }
        };

        let next = self.pending.take();
        match &next {
            Some(request) => self.start(request.clone()),
            None => self.state = RefreshState::Idle,
        }
        Ok(Completion { finished, next })
    }

    /// Check a response against the current keys and count the outcome.
    pub fn reconcile(
        &mut self,
        response_keys: &BTreeSet<LegKey>,
        current_keys: &BTreeSet<LegKey>,
    ) -> Reconciliation {
        let decision = Reconciliation::decide(response_keys, current_keys);
        match decision {
            Reconciliation::Apply => self.stats.applied += 1,
            Reconciliation::Discard => self.stats.discarded += 1,
        }
        decision
    }

    /// Count a response that carried a quote source error.
    pub const fn record_failure(&mut self) {
        self.stats.failed += 1;
    }

    /// Drop the pending request; the store has no legs left to quote.
    pub fn clear_pending(&mut self) -> Option<RefreshRequest> {
        self.pending.take()
    }

    /// Give up on the in-flight request after the worker could not take it.
    ///
    /// Returns to `Idle` and drops the pending request, which would go to the
    /// same worker.
    pub fn abort(&mut self) -> Option<RefreshRequest> {
        self.pending = None;
        match std::mem::take(&mut self.state) {
            RefreshState::Idle => None,
            RefreshState::Dispatching { in_flight } => Some(in_flight),
        }
    }

    fn issue(&mut self, target_keys: BTreeSet<LegKey>, trigger: RefreshTrigger) -> RefreshRequest {
        self.next_id += 1;
        RefreshRequest {
            id: self.next_id,
            target_keys,
            trigger,
        }
    }

    fn start(&mut self, request: RefreshRequest) {
        self.stats.dispatched += 1;
        self.state = RefreshState::Dispatching { in_flight: request };
    }
}
