//! # FabricFlow Domain
//!
//! Business domain types and models for FabricFlow.
//!
//! This crate contains:
//! - Wire-level request/response values shared by the transport ports
//! - Operation and job models (handles, outcomes, job records)
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other FabricFlow crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
