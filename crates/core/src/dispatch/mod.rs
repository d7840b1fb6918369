//! Authenticated request dispatch with retry, back-off and rate-limit
//! handling

pub mod classify;
pub mod dispatcher;
pub mod ports;
pub mod retry;

pub use classify::{classify, Disposition, RetryReason};
pub use dispatcher::ResilientDispatcher;
pub use ports::Transport;
pub use retry::RetryPolicy;
