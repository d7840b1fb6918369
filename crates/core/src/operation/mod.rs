//! Long-running operation handling
//!
//! [`StartResult`] interprets the response to the request that kicked an
//! operation off; [`OperationWaiter`] drives a pending handle to its
//! terminal state.

pub mod start;
pub mod waiter;

pub use start::{status_reference, StartResult};
pub use waiter::{OperationWaiter, PollResult, WaitBudget, WaitReport};
