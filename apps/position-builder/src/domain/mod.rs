//! Domain Layer
//!
//! Business logic with no I/O:
//!
//! - **Aggregates**: the Leg Store and its invariants
//! - **Value Objects**: keys, legs, quotes, position snapshots
//! - **Domain Services**: pure pricing functions
//!
//! # Bounded Contexts
//!
//! - [`position`]: Working legs, identity and last reconciled quotes
//! - [`pricing`]: Composite totals and payoff at expiry

pub mod position;
pub mod pricing;
