//! Observability setup
//!
//! Structured logging through `tracing`. The orchestration crates only emit
//! events; installing a subscriber is the binary's choice, made once at
//! startup with [`init_tracing`].

pub mod logging;

pub use logging::{build_filter, init_tracing};
