//! # FabricFlow Core
//!
//! Orchestration logic for asynchronous cloud operations - no HTTP library
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces for the transport and the credential source
//! - The token cache, the resilient dispatcher and its retry policy
//! - The long-running-operation waiter
//! - The sequential and batch job tracker
//!
//! ## Architecture Principles
//! - Only depends on `fabricflow-domain`
//! - All I/O goes through the [`Transport`] and [`CredentialSource`] traits
//! - Every wait is a `tokio::time` sleep bounded by an explicit budget

pub mod auth;
pub mod dispatch;
pub mod jobs;
pub mod operation;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use auth::ports::CredentialSource;
pub use auth::AuthTokenCache;
pub use dispatch::classify::{classify, Disposition, RetryReason};
pub use dispatch::ports::Transport;
pub use dispatch::{ResilientDispatcher, RetryPolicy};
pub use jobs::{Job, JobTracker, TrackerConfig};
pub use operation::{OperationWaiter, PollResult, StartResult, WaitBudget, WaitReport};
