//! Port interface for the HTTP transport

use async_trait::async_trait;
use fabricflow_domain::{ApiRequest, ApiResponse, Result, Token};

/// Sends one request and returns whatever the service answered.
///
/// Implementations must return `Ok` for every HTTP response, whatever its
/// status: deciding what a 401, 429 or 5xx means is the dispatcher's job.
/// `Err` is reserved for failures with no response at all, reported as
/// [`FlowError::Transport`](fabricflow_domain::FlowError::Transport) with
/// `retryable` set for timeouts and connection errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &ApiRequest, token: &Token) -> Result<ApiResponse>;
}
