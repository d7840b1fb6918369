//! Resilient dispatcher - authenticated requests with retry and back-off

use std::sync::Arc;
use std::time::Duration;

use fabricflow_domain::{ApiRequest, ApiResponse, FlowError, Result};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::classify::{classify, Disposition, RetryReason};
use super::ports::Transport;
use super::retry::RetryPolicy;
use crate::auth::AuthTokenCache;

/// Sends requests through the transport, attaching a cached token and
/// retrying transient failures.
///
/// Retry rules:
/// - 401: invalidate the token and retry once immediately. The retry uses a
///   slot of the budget; a second 401 is an authentication error.
/// - 429: sleep for `Retry-After` when given, otherwise back off.
/// - 5xx and retryable transport errors: exponential back-off.
/// - Any other non-2xx status: returned as [`FlowError::Api`] at once.
///
/// Every successful or pending response is handed back unchanged.
pub struct ResilientDispatcher {
    transport: Arc<dyn Transport>,
    tokens: Arc<AuthTokenCache>,
    policy: RetryPolicy,
}

impl ResilientDispatcher {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<AuthTokenCache>) -> Self {
        Self { transport, tokens, policy: RetryPolicy::default() }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub const fn tokens(&self) -> &Arc<AuthTokenCache> {
        &self.tokens
    }

    /// Send `request` using the configured retry budget.
    ///
    /// # Errors
    /// - [`FlowError::Auth`] when no token can be obtained or the service
    ///   rejects a refreshed token
    /// - [`FlowError::Api`] for terminal client errors
    /// - [`FlowError::ExhaustedRetries`] when retryable responses used up the
    ///   budget or the total wait cap
    /// - [`FlowError::Transport`] when the request could not be delivered
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.send_with_retries(request, self.policy.max_retries).await
    }

    /// Same as [`send`](Self::send) with an explicit retry budget.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send_with_retries(
        &self,
        request: &ApiRequest,
        max_retries: u32,
    ) -> Result<ApiResponse> {
        let mut attempt: u32 = 0;
        let mut retries: u32 = 0;
        let mut waited = Duration::ZERO;
        let mut refreshed_after_401 = false;

        loop {
            attempt += 1;
            let token = self.tokens.get_token().await?;

            let response = match self.transport.execute(request, &token).await {
                Ok(response) => response,
                Err(FlowError::Transport { message, retryable: true }) => {
                    let delay = if retries < max_retries {
                        self.policy.plan_delay(self.policy.backoff_delay(retries), false, waited)
                    } else {
                        None
                    };
                    let Some(delay) = delay else {
                        warn!(attempt, error = %message, "transport failure, giving up");
                        return Err(FlowError::Transport {
                            message: format!("{message} (after {attempt} attempts)"),
                            retryable: true,
                        });
                    };
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %message,
                        "transport failure, retrying"
                    );
                    sleep(delay).await;
                    waited += delay;
                    retries += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let status = response.status();
            let reason = match classify(&response) {
                Disposition::Retry(reason) => reason,
                Disposition::Rejected { status, message } => {
                    debug!(status, "request rejected");
                    return Err(FlowError::Api { status, message });
                }
                _ => {
                    debug!(status, attempt, "request accepted");
                    return Ok(response);
                }
            };

            if reason == RetryReason::Unauthorized && refreshed_after_401 {
                return Err(FlowError::Auth(format!(
                    "service rejected a refreshed token: {}",
                    response.error_message()
                )));
            }

            let exhausted = || FlowError::ExhaustedRetries {
                attempts: attempt,
                last_status: Some(status),
                message: response.error_message(),
            };

            if retries >= max_retries {
                warn!(status, attempt, "retry budget exhausted");
                return Err(exhausted());
            }

            // Forced refresh: takes a retry slot but no back-off
            if reason == RetryReason::Unauthorized {
                refreshed_after_401 = true;
                self.tokens.invalidate(&token).await;
                debug!(attempt, "token rejected, retrying with a fresh one");
                retries += 1;
                continue;
            }

            let delay = match reason {
                RetryReason::RateLimited { retry_after: Some(requested) } => {
                    self.policy.plan_delay(requested, true, waited)
                }
                _ => self.policy.plan_delay(self.policy.backoff_delay(retries), false, waited),
            };

            let Some(delay) = delay else {
                warn!(
                    status,
                    attempt,
                    waited_secs = waited.as_secs(),
                    "retry wait would exceed the total wait cap"
                );
                return Err(exhausted());
            };

            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            warn!(status, attempt, delay_ms, "retrying request");
            sleep(delay).await;
            waited += delay;
            retries += 1;
        }
    }
}

impl std::fmt::Debug for ResilientDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientDispatcher").field("policy", &self.policy).finish()
    }
}
