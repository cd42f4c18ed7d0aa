//! Presentation Sink Adapters

mod console;
mod recording;

pub use console::{ConsoleSink, render_snapshot};
pub use recording::RecordingSink;
