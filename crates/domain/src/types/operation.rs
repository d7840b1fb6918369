//! Long-running operation model
//!
//! An [`OperationHandle`] is what a caller holds between submitting an
//! asynchronous request and observing its terminal state. The terminal state
//! itself is an [`OperationOutcome`], a plain value: failed and timed-out
//! operations are expected results that callers branch on, not errors.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FlowError;
use crate::impl_domain_status_conversions;
use crate::utils::TruncateExt;

/// Status values reported in the `status` field of operation and job
/// instance bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    Queued,
    Running,
    InProgress,
    #[serde(alias = "Succeeded")]
    Completed,
    Failed,
    #[serde(alias = "Canceled")]
    Cancelled,
}

impl_domain_status_conversions!(OperationStatus {
    NotStarted => "NotStarted",
    Queued => "Queued",
    Running => "Running",
    InProgress => "InProgress",
    Completed => "Completed" | "Succeeded",
    Failed => "Failed",
    Cancelled => "Cancelled" | "Canceled",
});

impl OperationStatus {
    /// No further transition happens from a terminal status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Reference to an accepted-but-unfinished operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    /// Absolute URL or API-relative path polled for progress.
    pub status_url: String,
    /// Human label used in logs and job records.
    pub name: String,
    pub started_at: DateTime<Utc>,
    /// Server hint for the first poll, taken from `Retry-After`.
    pub retry_after: Option<Duration>,
    /// Where the payload is served once the operation succeeds. Only
    /// operations announced through a location header have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl OperationHandle {
    pub fn new(status_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            status_url: status_url.into(),
            name: name.into(),
            started_at: Utc::now(),
            retry_after: None,
            result_url: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    #[must_use]
    pub fn with_result_url(mut self, result_url: impl Into<String>) -> Self {
        self.result_url = Some(result_url.into());
        self
    }
}

/// Terminal result of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// Finished successfully; `body` is `Null` when the service sent none.
    Completed { body: Value },
    /// Finished unsuccessfully, or could not be driven to completion.
    Failed { code: String, message: String },
    /// Abandoned after the wait budget ran out or the run was cancelled.
    TimedOut { elapsed: Duration },
}

impl OperationOutcome {
    pub const fn completed(body: Value) -> Self {
        Self::Completed { body }
    }

    pub const fn completed_empty() -> Self {
        Self::Completed { body: Value::Null }
    }

    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed { code: code.into(), message: message.into() }
    }

    pub const fn timed_out(elapsed: Duration) -> Self {
        Self::TimedOut { elapsed }
    }

    /// Fold a request-level error into a failed outcome.
    pub fn from_error(err: &FlowError) -> Self {
        Self::Failed { code: err.code(), message: err.to_string().as_str().truncated() }
    }

    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Result body of a completed operation.
    pub const fn body(&self) -> Option<&Value> {
        match self {
            Self::Completed { body } => Some(body),
            _ => None,
        }
    }

    /// Error text for failed or timed-out outcomes.
    pub fn error_text(&self) -> Option<String> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { code, message } => Some(format!("{code}: {message}")),
            Self::TimedOut { elapsed } => Some(format!("timed out after {}s", elapsed.as_secs())),
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { .. } => f.write_str("completed"),
            Self::Failed { code, .. } => write!(f, "failed ({code})"),
            Self::TimedOut { elapsed } => write!(f, "timed out after {elapsed:?}"),
        }
    }
}
