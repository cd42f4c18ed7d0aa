//! Application Layer
//!
//! Orchestrates the domain through:
//!
//! - **Ports**: interfaces to the quote source and the presentation sink
//! - **Services**: the refresh state machine, the quote worker task and the
//!   position builder that ties them to the Leg Store

pub mod ports;
pub mod services;

pub use ports::*;
pub use services::*;
