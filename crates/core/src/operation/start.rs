//! Interpretation of the response that starts an operation

use fabricflow_domain::constants::{
    HEADER_LOCATION, HEADER_OPERATION_ID, HEADER_OPERATION_LOCATION,
};
use fabricflow_domain::{ApiRequest, ApiResponse, OperationHandle, OperationOutcome};
use serde_json::Value;
use tracing::warn;

use crate::dispatch::classify::{classify, Disposition};

/// What the caller holds after submitting a request.
#[derive(Debug, Clone, PartialEq)]
pub enum StartResult {
    /// The request completed synchronously, or was refused.
    Finished(OperationOutcome),
    /// The service accepted the request; poll the handle for the result.
    Pending(OperationHandle),
}

impl StartResult {
    /// Build a start result from the dispatcher's response to `request`.
    ///
    /// Pending operations are tracked through, in order, `Location`,
    /// `Operation-Location` or `x-ms-operation-id`. A 2xx body reporting a
    /// non-terminal `status` without any of those is polled at the request
    /// path itself. A 202 with no way to follow it is reported as completed.
    pub fn from_response(request: &ApiRequest, name: &str, response: &ApiResponse) -> Self {
        match classify(response) {
            Disposition::Completed => Self::Finished(OperationOutcome::completed(
                response.json_value().unwrap_or(Value::Null),
            )),
            Disposition::Failed { code, message } => {
                Self::Finished(OperationOutcome::Failed { code, message })
            }
            Disposition::Pending { status, retry_after } => {
                let location = location_reference(response);
                let status_url = status_reference(response)
                    .or_else(|| status.map(|_| request.path.clone()));
                match status_url {
                    Some(url) => {
                        let mut handle =
                            OperationHandle::new(url, name).with_retry_after(retry_after);
                        if let Some(location) = location {
                            handle = handle.with_result_url(format!(
                                "{}/result",
                                location.trim_end_matches('/')
                            ));
                        }
                        Self::Pending(handle)
                    }
                    None => {
                        warn!(
                            operation = name,
                            status = response.status(),
                            "accepted without a status reference, treating as completed"
                        );
                        Self::Finished(OperationOutcome::completed_empty())
                    }
                }
            }
            Disposition::Rejected { status, message } => {
                Self::Finished(OperationOutcome::failed(format!("HTTP{status}"), message))
            }
            Disposition::Retry(_) => Self::Finished(OperationOutcome::failed(
                format!("HTTP{}", response.status()),
                response.error_message(),
            )),
        }
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Status URL advertised by an accepted response.
///
/// A bare operation id is turned into the API-relative path
/// `operations/{id}`.
pub fn status_reference(response: &ApiResponse) -> Option<String> {
    location_reference(response).or_else(|| {
        non_empty_header(response, HEADER_OPERATION_ID).map(|id| format!("operations/{id}"))
    })
}

/// `Location` or `Operation-Location`; only these operations serve a
/// `/result` payload.
fn location_reference(response: &ApiResponse) -> Option<String> {
    non_empty_header(response, HEADER_LOCATION)
        .or_else(|| non_empty_header(response, HEADER_OPERATION_LOCATION))
}

fn non_empty_header(response: &ApiResponse, name: &str) -> Option<String> {
    response.header(name).map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[test]
    fn accepted_with_location_is_pending() {
        let request = ApiRequest::post("workspaces/w1/items");
        let response = ApiResponse::from_status(202, "")
            .with_header("Location", "https://api.example.com/v1/operations/op-1")
            .with_header("Retry-After", "4");

        match StartResult::from_response(&request, "create lakehouse", &response) {
            StartResult::Pending(handle) => {
                assert_eq!(handle.status_url, "https://api.example.com/v1/operations/op-1");
                assert_eq!(handle.name, "create lakehouse");
                assert_eq!(handle.retry_after, Some(Duration::from_secs(4)));
                assert_eq!(
                    handle.result_url.as_deref(),
                    Some("https://api.example.com/v1/operations/op-1/result")
                );
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[test]
    fn operation_id_becomes_relative_path() {
        let response = ApiResponse::from_status(202, "").with_header("x-ms-operation-id", "abc");
        assert_eq!(status_reference(&response).as_deref(), Some("operations/abc"));

        let response = ApiResponse::from_status(202, "")
            .with_header("Operation-Location", "https://x/ops/2")
            .with_header("x-ms-operation-id", "abc");
        assert_eq!(status_reference(&response).as_deref(), Some("https://x/ops/2"));
    }

    #[test]
    fn operation_id_handle_has_no_result_url() {
        let request = ApiRequest::post("workspaces/w1/items");
        let response = ApiResponse::from_status(202, "").with_header("x-ms-operation-id", "abc");

        match StartResult::from_response(&request, "create", &response) {
            StartResult::Pending(handle) => {
                assert_eq!(handle.status_url, "operations/abc");
                assert_eq!(handle.result_url, None);
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[test]
    fn body_status_without_location_polls_request_path() {
        let request = ApiRequest::get("workspaces/w1/items/nb/jobs/instances/j1");
        let response = ApiResponse::json_body(200, &json!({"status": "Running"}));

        match StartResult::from_response(&request, "run notebook", &response) {
            StartResult::Pending(handle) => {
                assert_eq!(handle.status_url, request.path);
                assert_eq!(handle.result_url, None);
            }
            other => panic!("expected pending, got {other:?}"),
        }
    }

    #[test]
    fn synchronous_success_is_finished() {
        let request = ApiRequest::post("workspaces");
        let response = ApiResponse::json_body(201, &json!({"id": "w1"}));
        assert_eq!(
            StartResult::from_response(&request, "create workspace", &response),
            StartResult::Finished(OperationOutcome::completed(json!({"id": "w1"})))
        );
    }

    #[test]
    fn accepted_without_reference_counts_as_completed() {
        let request = ApiRequest::post("workspaces/w1/items/nb/jobs/instances");
        let response = ApiResponse::from_status(202, "");
        assert_eq!(
            StartResult::from_response(&request, "run", &response),
            StartResult::Finished(OperationOutcome::completed_empty())
        );
    }

    #[test]
    fn rejected_start_is_failed_outcome() {
        let request = ApiRequest::post("workspaces");
        let response = ApiResponse::json_body(409, &json!({"errorCode": "Dup", "message": "x"}));
        assert_eq!(
            StartResult::from_response(&request, "create", &response),
            StartResult::Finished(OperationOutcome::failed("HTTP409", "Dup: x"))
        );
    }
}
