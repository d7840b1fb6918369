//! Response classification shared by the dispatcher and the waiter
//!
//! Both components need to agree on what a status code or a body `status`
//! field means, so the decision lives in one pure function.

use std::time::Duration;

use fabricflow_domain::{ApiResponse, OperationStatus};
use serde_json::Value;

/// Why a response should be retried by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// 401: the token was rejected; refresh once and retry.
    Unauthorized,
    /// 429: honour `retry_after` when present, else back off.
    RateLimited { retry_after: Option<Duration> },
    /// 5xx: back off and retry.
    ServerError { status: u16 },
}

/// What a response means for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Transient failure, the request should be sent again.
    Retry(RetryReason),
    /// The service accepted the request, or reports an operation that has
    /// not reached a terminal state yet.
    Pending { status: Option<OperationStatus>, retry_after: Option<Duration> },
    /// Success, either synchronous or an operation reporting completion.
    Completed,
    /// The operation ran and reported failure or cancellation.
    Failed { code: String, message: String },
    /// Terminal client error: not retried, not an operation state.
    Rejected { status: u16, message: String },
}

impl Disposition {
    pub const fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }
}

/// Classify a response.
///
/// Status codes decide first: 401, 429 and 5xx are retryable, 202 is
/// pending, other non-2xx codes are rejections. For any other 2xx the body's
/// `status` field decides, when it holds a known operation status. Bodies
/// without one, or with a value that is not an operation status (a resource
/// may carry its own `status` field), mean the call completed.
pub fn classify(response: &ApiResponse) -> Disposition {
    let status = response.status();
    match status {
        401 => return Disposition::Retry(RetryReason::Unauthorized),
        429 => {
            return Disposition::Retry(RetryReason::RateLimited {
                retry_after: response.retry_after(),
            })
        }
        500..=599 => return Disposition::Retry(RetryReason::ServerError { status }),
        200..=299 => {}
        _ => return Disposition::Rejected { status, message: response.error_message() },
    }

    let body = response.json_value();
    let reported = body.as_ref().and_then(body_status);

    if status == 202 {
        return Disposition::Pending {
            status: reported.filter(|s| !s.is_terminal()),
            retry_after: response.retry_after(),
        };
    }

    match reported {
        Some(op_status) if !op_status.is_terminal() => {
            Disposition::Pending { status: Some(op_status), retry_after: response.retry_after() }
        }
        Some(op_status @ (OperationStatus::Failed | OperationStatus::Cancelled)) => {
            let body = body.unwrap_or(Value::Null);
            let (code, message) = failure_details(&body, op_status);
            Disposition::Failed { code, message }
        }
        _ => Disposition::Completed,
    }
}

/// Parse the body's `status` field as an operation status.
pub fn body_status(body: &Value) -> Option<OperationStatus> {
    body.get("status").and_then(Value::as_str).and_then(|raw| raw.parse().ok())
}

/// Pull an error code and message out of a failed operation body.
///
/// Operation status documents put details under `error`, job instances use
/// `failureReason`. The status name stands in when neither is present.
pub fn failure_details(body: &Value, status: OperationStatus) -> (String, String) {
    let sections = [body.get("failureReason"), body.get("error")];
    let field = |keys: &[&str]| {
        sections.iter().flatten().find_map(|section| {
            keys.iter().find_map(|k| section.get(*k).and_then(Value::as_str))
        })
    };

    let code = field(&["errorCode", "code"]).map_or_else(|| status.to_string(), str::to_string);
    let message = field(&["message", "errorMessage"])
        .map_or_else(|| format!("operation reported status {status}"), str::to_string);
    (code, message)
}
