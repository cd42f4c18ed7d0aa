//! Position Value Objects

mod leg;
mod leg_key;
mod position;
mod quote;

pub use leg::{Leg, LegAction};
pub use leg_key::{LegKey, OptionRight};
pub use position::Position;
pub use quote::Quote;
