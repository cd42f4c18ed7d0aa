//! Pricing Engine
//!
//! Pure functions from a [`Position`](crate::domain::position::Position)
//! snapshot to composite prices and an expiry payoff curve. No I/O, no state.

pub mod errors;
mod payoff;
mod totals;

pub use errors::PricingError;
pub use payoff::{
    MAX_GRID_POINTS, PayoffCurve, PayoffPoint, PayoffPoints, PriceRange, payoff_curve,
    payoff_curve_for,
};
pub use totals::{Sign, Total, Totals, format_total, lazy_total, net_delta, smart_total};
