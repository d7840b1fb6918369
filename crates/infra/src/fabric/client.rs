//! Facade wiring configuration to the orchestration stack
//!
//! transport -> token cache -> dispatcher -> waiter -> tracker

use std::sync::Arc;

use fabricflow_core::{
    AuthTokenCache, CredentialSource, Job, JobTracker, OperationWaiter, ResilientDispatcher,
    RetryPolicy, StartResult, TrackerConfig, Transport, WaitBudget,
};
use fabricflow_domain::{
    ApiRequest, FlowConfig, FlowError, OperationHandle, OperationOutcome, Result,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::auth::credential_source;
use crate::http::ReqwestTransport;

/// Client for a Fabric-style REST API with long-running operations.
pub struct FabricClient {
    config: FlowConfig,
    dispatcher: Arc<ResilientDispatcher>,
    waiter: Arc<OperationWaiter>,
    tracker: JobTracker,
}

impl FabricClient {
    /// Build the full stack from configuration: reqwest transport plus the
    /// credential source the `auth` section describes.
    ///
    /// # Errors
    /// Returns [`FlowError::Config`] when the configuration is invalid or
    /// names no usable credentials.
    pub fn from_config(config: FlowConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::from_config(&config.api)?);
        let credentials = credential_source(&config.auth)?;
        Ok(Self::with_parts(config, transport, credentials))
    }

    /// Build the stack around caller-supplied ports.
    pub fn with_parts(
        config: FlowConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        let tokens = Arc::new(
            AuthTokenCache::new(credentials).with_refresh_margin(config.auth.refresh_margin()),
        );
        let dispatcher = Arc::new(
            ResilientDispatcher::new(transport, tokens)
                .with_policy(RetryPolicy::from(&config.retry)),
        );
        let waiter = Arc::new(
            OperationWaiter::new(Arc::clone(&dispatcher))
                .with_retry_after_cap(config.polling.retry_after_cap())
                .with_not_found_as_completed(config.polling.treat_not_found_as_completed),
        );
        let tracker = JobTracker::new(Arc::clone(&waiter))
            .with_config(TrackerConfig::from(&config.polling));

        Self { config, dispatcher, waiter, tracker }
    }

    pub const fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub const fn dispatcher(&self) -> &Arc<ResilientDispatcher> {
        &self.dispatcher
    }

    pub const fn waiter(&self) -> &Arc<OperationWaiter> {
        &self.waiter
    }

    pub const fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Budget for resource operations such as item creation.
    pub const fn resource_budget(&self) -> WaitBudget {
        WaitBudget::new(self.config.polling.max_wait(), self.config.polling.resource_interval())
    }

    /// Budget for compute jobs such as notebook or pipeline runs.
    pub const fn job_budget(&self) -> WaitBudget {
        WaitBudget::new(self.config.polling.max_wait(), self.config.polling.job_interval())
    }

    /// Send a start request and interpret the response.
    pub async fn start(&self, label: &str, request: ApiRequest) -> Result<StartResult> {
        let response = self.dispatcher.send(&request).await?;
        Ok(StartResult::from_response(&request, label, &response))
    }

    /// Start an operation and wait for it within the resource budget.
    ///
    /// # Errors
    /// Only the start request can fail; once accepted, the operation's fate
    /// is reported as an outcome.
    pub async fn execute(&self, label: &str, request: ApiRequest) -> Result<OperationOutcome> {
        self.execute_with_budget(label, request, self.resource_budget()).await
    }

    #[instrument(skip(self, request, budget), fields(path = %request.path))]
    pub async fn execute_with_budget(
        &self,
        label: &str,
        request: ApiRequest,
        budget: WaitBudget,
    ) -> Result<OperationOutcome> {
        Ok(match self.start(label, request).await? {
            StartResult::Finished(outcome) => outcome,
            StartResult::Pending(handle) => {
                self.waiter.wait(&handle, budget.max_wait, budget.poll_interval).await
            }
        })
    }

    /// [`execute`](Self::execute) for operations whose payload is served
    /// separately at `{location}/result` once they succeed.
    ///
    /// Operations without a result endpoint keep the body their final
    /// status poll returned.
    ///
    /// # Errors
    /// Fails when the start request fails or the result cannot be fetched.
    pub async fn execute_with_result(
        &self,
        label: &str,
        request: ApiRequest,
    ) -> Result<OperationOutcome> {
        let budget = self.resource_budget();
        let handle = match self.start(label, request).await? {
            StartResult::Finished(outcome) => return Ok(outcome),
            StartResult::Pending(handle) => handle,
        };

        let outcome = self.waiter.wait(&handle, budget.max_wait, budget.poll_interval).await;
        if !outcome.is_completed() {
            return Ok(outcome);
        }
        Ok(self.fetch_result(&handle).await?.map_or(outcome, OperationOutcome::completed))
    }

    /// Fetch the payload of a finished operation.
    ///
    /// Returns `None` when the handle has no result endpoint or the service
    /// no longer serves one.
    ///
    /// # Errors
    /// Returns [`FlowError::InvalidResponse`] when the body is not JSON.
    pub async fn fetch_result(&self, handle: &OperationHandle) -> Result<Option<Value>> {
        let Some(url) = handle.result_url.as_deref() else {
            return Ok(None);
        };
        debug!(operation = %handle.name, %url, "fetching operation result");

        let response = match self.dispatcher.send(&ApiRequest::get(url)).await {
            Ok(response) => response,
            Err(FlowError::Api { status: 404, .. }) => {
                debug!(operation = %handle.name, "no result served for operation");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if response.body().is_empty() {
            return Ok(Some(Value::Null));
        }
        response.json_value().map(Some).ok_or_else(|| {
            FlowError::InvalidResponse(format!("operation result is not JSON: {}", handle.name))
        })
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatcher.send(&ApiRequest::get(path)).await?.json()
    }

    /// POST `body` as JSON to `path` and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).with_json(body)?;
        self.dispatcher.send(&request).await?.json()
    }

    /// Tracker job that sends `request` and follows the operation it starts.
    pub fn job(&self, label: impl Into<String>, request: ApiRequest) -> Job {
        Job::submit(label, Arc::clone(&self.dispatcher), request)
    }
}

impl std::fmt::Debug for FabricClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricClient")
            .field("base_url", &self.config.api.base_url)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
