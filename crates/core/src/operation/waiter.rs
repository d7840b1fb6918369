//! Operation waiter - polls a status endpoint until a terminal state

use std::sync::Arc;
use std::time::Duration;

use fabricflow_domain::constants::{
    DEFAULT_MAX_WAIT_SECS, DEFAULT_RESOURCE_POLL_INTERVAL_SECS, DEFAULT_RETRY_AFTER_CAP_SECS,
};
use fabricflow_domain::{ApiRequest, FlowError, OperationHandle, OperationOutcome};
use serde_json::Value;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::dispatch::classify::{classify, Disposition};
use crate::dispatch::ResilientDispatcher;

/// Time limits for waiting on one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBudget {
    /// Give up once this much time has passed since waiting began.
    pub max_wait: Duration,
    /// Delay between polls when the service gives no `Retry-After` hint.
    pub poll_interval: Duration,
}

impl WaitBudget {
    pub const fn new(max_wait: Duration, poll_interval: Duration) -> Self {
        Self { max_wait, poll_interval }
    }
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            Duration::from_secs(DEFAULT_RESOURCE_POLL_INTERVAL_SECS),
        )
    }
}

/// Result of a single status poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    Terminal(OperationOutcome),
    /// Still running; `retry_after` is the service's hint for the next poll.
    Pending { retry_after: Option<Duration> },
}

/// Terminal outcome plus how many polls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitReport {
    pub outcome: OperationOutcome,
    pub polls: u32,
}

/// Polls operation status endpoints through the dispatcher.
///
/// Transient failures during a poll are retried by the dispatcher. A poll
/// that still fails becomes a failed outcome; the waiter itself never
/// returns an error.
pub struct OperationWaiter {
    dispatcher: Arc<ResilientDispatcher>,
    retry_after_cap: Duration,
    treat_not_found_as_completed: bool,
}

impl OperationWaiter {
    pub fn new(dispatcher: Arc<ResilientDispatcher>) -> Self {
        Self {
            dispatcher,
            retry_after_cap: Duration::from_secs(DEFAULT_RETRY_AFTER_CAP_SECS),
            treat_not_found_as_completed: true,
        }
    }

    /// Upper bound applied to `Retry-After` hints between polls.
    #[must_use]
    pub const fn with_retry_after_cap(mut self, cap: Duration) -> Self {
        self.retry_after_cap = cap;
        self
    }

    /// Whether a 404 from the status endpoint means the operation finished.
    ///
    /// Some services delete operation records as soon as they complete, so
    /// this is on by default.
    #[must_use]
    pub const fn with_not_found_as_completed(mut self, enabled: bool) -> Self {
        self.treat_not_found_as_completed = enabled;
        self
    }

    pub const fn dispatcher(&self) -> &Arc<ResilientDispatcher> {
        &self.dispatcher
    }

    /// Wait for `handle` to reach a terminal state.
    pub async fn wait(
        &self,
        handle: &OperationHandle,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> OperationOutcome {
        let budget = WaitBudget::new(max_wait, poll_interval);
        self.wait_with_report(handle, budget, &CancellationToken::new()).await.outcome
    }

    /// Wait for `handle`, stopping early when `cancel` fires.
    ///
    /// Cancellation and an exhausted budget both yield
    /// [`OperationOutcome::TimedOut`].
    #[instrument(
        skip(self, cancel),
        fields(operation = %handle.name, status_url = %handle.status_url)
    )]
    pub async fn wait_with_report(
        &self,
        handle: &OperationHandle,
        budget: WaitBudget,
        cancel: &CancellationToken,
    ) -> WaitReport {
        let started = Instant::now();
        let deadline = started + budget.max_wait;
        let mut delay = self.next_delay(handle.retry_after, budget.poll_interval);
        let mut polls: u32 = 0;

        loop {
            let elapsed = started.elapsed();
            if elapsed >= budget.max_wait {
                return Self::expired(started, polls);
            }

            let nap = delay.min(budget.max_wait - elapsed);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Self::cancelled(started, polls);
                }
                () = sleep(nap) => {}
            }

            polls += 1;
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Self::cancelled(started, polls);
                }
                result = self.poll_once(handle) => result,
                // A poll stuck in dispatcher back-off must not outlive the budget
                () = sleep_until(deadline) => {
                    return Self::expired(started, polls);
                }
            };

            match result {
                PollResult::Terminal(outcome) => {
                    let elapsed_secs = started.elapsed().as_secs();
                    info!(polls, elapsed_secs, %outcome, "operation finished");
                    return WaitReport { outcome, polls };
                }
                PollResult::Pending { retry_after } => {
                    delay = self.next_delay(retry_after, budget.poll_interval);
                    let next_poll_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    debug!(polls, next_poll_ms, "operation still running");
                }
            }
        }
    }

    /// Issue one status request and interpret it.
    pub async fn poll_once(&self, handle: &OperationHandle) -> PollResult {
        let request = ApiRequest::get(handle.status_url.as_str());
        let response = match self.dispatcher.send(&request).await {
            Ok(response) => response,
            Err(FlowError::Api { status: 404, message }) if self.treat_not_found_as_completed => {
                warn!(
                    operation = %handle.name,
                    status_url = %handle.status_url,
                    error = %message,
                    "status endpoint returned 404, assuming the operation completed"
                );
                return PollResult::Terminal(OperationOutcome::completed_empty());
            }
            Err(err) => {
                warn!(operation = %handle.name, error = %err, "status poll failed");
                return PollResult::Terminal(OperationOutcome::from_error(&err));
            }
        };

        match classify(&response) {
            Disposition::Pending { retry_after, .. } => PollResult::Pending { retry_after },
            Disposition::Completed => PollResult::Terminal(OperationOutcome::completed(
                response.json_value().unwrap_or(Value::Null),
            )),
            Disposition::Failed { code, message } => {
                PollResult::Terminal(OperationOutcome::Failed { code, message })
            }
            // The dispatcher turns these into errors; kept for completeness
            Disposition::Retry(_) | Disposition::Rejected { .. } => {
                PollResult::Terminal(OperationOutcome::failed(
                    format!("HTTP{}", response.status()),
                    response.error_message(),
                ))
            }
        }
    }

    fn next_delay(&self, hint: Option<Duration>, fallback: Duration) -> Duration {
        hint.map_or(fallback, |requested| requested.min(self.retry_after_cap))
    }

    fn expired(started: Instant, polls: u32) -> WaitReport {
        let elapsed = started.elapsed();
        warn!(polls, elapsed_secs = elapsed.as_secs(), "operation wait budget exhausted");
        WaitReport { outcome: OperationOutcome::timed_out(elapsed), polls }
    }

    fn cancelled(started: Instant, polls: u32) -> WaitReport {
        let elapsed = started.elapsed();
        warn!(polls, elapsed_secs = elapsed.as_secs(), "operation wait cancelled");
        WaitReport { outcome: OperationOutcome::timed_out(elapsed), polls }
    }
}

impl std::fmt::Debug for OperationWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationWaiter")
            .field("retry_after_cap", &self.retry_after_cap)
            .field("treat_not_found_as_completed", &self.treat_not_found_as_completed)
            .finish_non_exhaustive()
    }
}
