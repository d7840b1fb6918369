//! # FabricFlow Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP transport (`reqwest` with rustls)
//! - Credential sources (static token, OAuth2 client credentials)
//! - Configuration loading from files and environment
//! - Tracing subscriber setup
//! - The [`FabricClient`] facade wiring everything together
//!
//! ## Architecture
//! - Implements traits defined in `fabricflow-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod auth;
pub mod config;
pub mod errors;
pub mod fabric;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use auth::{credential_source, ClientCredentialsSource, StaticTokenSource};
pub use errors::InfraError;
pub use fabric::FabricClient;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::init_tracing;
