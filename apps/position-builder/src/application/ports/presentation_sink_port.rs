//! Presentation Sink Port

use serde::Serialize;

use crate::domain::position::Position;
use crate::domain::pricing::{PayoffCurve, Totals};

/// Single status line shown under the totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum Status {
    /// Nothing to report.
    #[default]
    Ready,
    /// Last refresh failed.
    Error(String),
}

impl Status {
    /// Check if this is an error status.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Error(message) => write!(f, "{message}"),
        }
    }
}

/// Everything the sink needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Legs in display order.
    pub position: Position,
    /// Composite prices.
    pub totals: Totals,
    /// Status line.
    pub status: Status,
    /// A quote request is outstanding.
    pub refreshing: bool,
    /// Payoff at expiry, absent when there is no cost basis.
    #[serde(skip)]
    pub curve: Option<PayoffCurve>,
}

/// Port for rendering position snapshots.
///
/// Only ever called from the coordinating task, after every mutation and
/// every reconciled response.
pub trait PresentationSink: Send {
    /// Render a snapshot.
    fn on_snapshot(&self, snapshot: &Snapshot);
}

impl<T: PresentationSink + Sync> PresentationSink for std::sync::Arc<T> {
    fn on_snapshot(&self, snapshot: &Snapshot) {
        (**self).on_snapshot(snapshot);
    }
}
