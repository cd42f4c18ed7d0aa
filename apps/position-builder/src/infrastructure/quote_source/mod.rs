//! Quote Source Adapters
//!
//! - [`ChainQuoteSource`]: option chain snapshot loaded from a YAML file
//! - [`MockQuoteSource`]: scripted source for tests

mod chain;
mod mock;

pub use chain::{ChainFile, ChainFileError, ChainQuoteSource, ChainRow};
pub use mock::MockQuoteSource;
