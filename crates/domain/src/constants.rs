//! Application constants
//!
//! Centralized location for the domain-level defaults used by the
//! orchestration layer. Configuration values override most of them.

// Authentication
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

// Dispatcher retry policy
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_CAP_SECS: u64 = 300;

// Operation polling
pub const DEFAULT_RESOURCE_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_JOB_POLL_INTERVAL_SECS: u64 = 20;
pub const DEFAULT_MAX_WAIT_SECS: u64 = 1_800;
pub const DEFAULT_RETRY_AFTER_CAP_SECS: u64 = 60;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

// HTTP
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_API_BASE_URL: &str = "https://api.fabric.microsoft.com/v1";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_SCOPE: &str = "https://api.fabric.microsoft.com/.default";
pub const USER_AGENT: &str = concat!("fabricflow/", env!("CARGO_PKG_VERSION"));

/// Upper bound on error-body characters carried in error messages.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 512;
/// Upper bound on bytes read from a non-success response body.
pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
pub const TRUNCATE_SUFFIX: &str = "...";

// Headers
pub const HEADER_RETRY_AFTER: &str = "retry-after";
pub const HEADER_LOCATION: &str = "location";
pub const HEADER_OPERATION_LOCATION: &str = "operation-location";
pub const HEADER_OPERATION_ID: &str = "x-ms-operation-id";
