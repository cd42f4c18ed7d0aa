//! Command Console
//!
//! Line-oriented driver adapter: reads commands, forwards them to a
//! [`BuilderHandle`](crate::application::services::BuilderHandle) and prints
//! the replies. [`Args`] holds the process arguments.

mod args;
mod command;
mod repl;

pub use args::Args;
pub use command::{Command, CommandParseError, USAGE};
pub use repl::{ReplControl, execute, run_repl};
