//! Conversions from third-party errors into [`FlowError`](fabricflow_domain::FlowError)

pub mod conversions;

pub use conversions::InfraError;
