//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - **Driven Adapters (Outbound)**
//!   - `quote_source/`: option chain file source, scripted mock
//!   - `presentation/`: console renderer, recording sink
//!
//! - **Driver Adapters (Inbound)**
//!   - `cli/`: line-oriented command console

pub mod cli;
pub mod presentation;
pub mod quote_source;
