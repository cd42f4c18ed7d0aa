//! Application Ports (Driven)
//!
//! How the builder uses the outside world: a slow, single-session quote
//! source and a sink that renders snapshots.

mod presentation_sink_port;
mod quote_source_port;

pub use presentation_sink_port::{PresentationSink, Snapshot, Status};
pub use quote_source_port::{QuoteBatch, QuoteSourceError, QuoteSourcePort};
