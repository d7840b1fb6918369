//! Domain types and models
//!
//! Values that cross the boundaries between the transport, the dispatcher,
//! the operation waiter and the job tracker.

pub mod http;
pub mod job;
pub mod operation;
pub mod token;

pub use http::{ApiRequest, ApiResponse, HttpMethod};
pub use job::{JobId, JobRecord, RunSummary};
pub use operation::{OperationHandle, OperationOutcome, OperationStatus};
pub use token::Token;
