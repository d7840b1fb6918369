//! Configuration structures
//!
//! Every section has serde defaults so a config file only needs the values
//! that differ from them. Durations are stored as plain integers (seconds or
//! milliseconds, as the field name says) to keep TOML and env files simple.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTHORITY_URL, DEFAULT_BASE_BACKOFF_MS,
    DEFAULT_JOB_POLL_INTERVAL_SECS, DEFAULT_MAX_BACKOFF_SECS, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_WAIT_SECS, DEFAULT_RATE_LIMIT_CAP_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RESOURCE_POLL_INTERVAL_SECS,
    DEFAULT_RETRY_AFTER_CAP_SECS, DEFAULT_SCOPE, DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
};
use crate::errors::{FlowError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub retry: RetryConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

impl FlowConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns [`FlowError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(FlowError::Config("api.base_url must not be empty".into()));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(FlowError::Config("api.request_timeout_secs must be positive".into()));
        }
        if self.polling.max_concurrency == 0 {
            return Err(FlowError::Config("polling.max_concurrency must be positive".into()));
        }
        if self.retry.max_backoff_secs.saturating_mul(1_000) < self.retry.base_backoff_ms {
            return Err(FlowError::Config(
                "retry.max_backoff_secs must not be smaller than retry.base_backoff_ms".into(),
            ));
        }
        self.auth.validate()
    }
}

/// Platform REST endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

impl ApiConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Credential settings
///
/// Either a pre-issued `token`, or the service-principal triple
/// (`tenant_id`, `client_id`, `client_secret`) for the client-credentials
/// grant.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub refresh_margin_secs: u64,
    pub authority_url: String,
    pub scope: String,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            tenant_id: None,
            client_id: None,
            client_secret: None,
            token: None,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("refresh_margin_secs", &self.refresh_margin_secs)
            .field("authority_url", &self.authority_url)
            .field("scope", &self.scope)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthConfig {
    pub const fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    /// True when the service-principal fields are all present.
    pub const fn has_client_credentials(&self) -> bool {
        self.tenant_id.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    fn validate(&self) -> Result<()> {
        let partial =
            self.tenant_id.is_some() || self.client_id.is_some() || self.client_secret.is_some();
        if partial && !self.has_client_credentials() {
            return Err(FlowError::Config(
                "auth.tenant_id, auth.client_id and auth.client_secret must be set together".into(),
            ));
        }
        Ok(())
    }
}

/// Dispatcher retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_secs: u64,
    /// Upper bound on the total time one request may spend sleeping
    /// between retries.
    pub rate_limit_cap_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            rate_limit_cap_secs: DEFAULT_RATE_LIMIT_CAP_SECS,
        }
    }
}

/// Operation polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval for resource operations (create item, import file).
    pub resource_interval_secs: u64,
    /// Interval for compute jobs such as notebook runs.
    pub job_interval_secs: u64,
    pub max_wait_secs: u64,
    pub retry_after_cap_secs: u64,
    pub max_concurrency: usize,
    /// Report a 404 from a status endpoint as completion.
    pub treat_not_found_as_completed: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            resource_interval_secs: DEFAULT_RESOURCE_POLL_INTERVAL_SECS,
            job_interval_secs: DEFAULT_JOB_POLL_INTERVAL_SECS,
            max_wait_secs: DEFAULT_MAX_WAIT_SECS,
            retry_after_cap_secs: DEFAULT_RETRY_AFTER_CAP_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            treat_not_found_as_completed: true,
        }
    }
}

impl PollingConfig {
    pub const fn resource_interval(&self) -> Duration {
        Duration::from_secs(self.resource_interval_secs)
    }

    pub const fn job_interval(&self) -> Duration {
        Duration::from_secs(self.job_interval_secs)
    }

    pub const fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub const fn retry_after_cap(&self) -> Duration {
        Duration::from_secs(self.retry_after_cap_secs)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
