//! Position Bounded Context
//!
//! The working multi-leg position:
//! - Leg identity (expiration, strike, right) and per-leg state
//! - The Leg Store aggregate with merge-or-replace key changes
//! - Immutable position snapshots for downstream consumers

pub mod errors;
mod leg_store;
pub mod value_objects;

pub use errors::LegStoreError;
pub use leg_store::{EditOutcome, LegField, LegStore};
pub use value_objects::{Leg, LegAction, LegKey, OptionRight, Position, Quote};
