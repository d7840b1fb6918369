//! Unit of work submitted to the job tracker

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use fabricflow_domain::{ApiRequest, OperationHandle, Result};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::dispatch::ResilientDispatcher;
use crate::operation::{StartResult, WaitBudget};

/// Boxed future returned by a job's start action.
pub type StartFuture = BoxFuture<'static, Result<StartResult>>;

pub(crate) type StartAction = Box<dyn FnOnce() -> StartFuture + Send>;

/// A labelled action that starts an operation.
///
/// The action runs exactly once. It usually sends the start request through
/// a dispatcher and turns the response into a [`StartResult`].
pub struct Job {
    label: String,
    start: StartAction,
    budget: Option<WaitBudget>,
}

impl Job {
    pub fn new<F, Fut>(label: impl Into<String>, start: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<StartResult>> + Send + 'static,
    {
        Self { label: label.into(), start: Box::new(move || start().boxed()), budget: None }
    }

    /// Job that sends `request` through `dispatcher` and follows whatever
    /// operation the response starts.
    pub fn submit(
        label: impl Into<String>,
        dispatcher: Arc<ResilientDispatcher>,
        request: ApiRequest,
    ) -> Self {
        let label = label.into();
        let name = label.clone();
        Self::new(label, move || async move {
            let response = dispatcher.send(&request).await?;
            Ok(StartResult::from_response(&request, &name, &response))
        })
    }

    /// Job whose operation is already running, e.g. one resumed from a
    /// previous run.
    pub fn pending(label: impl Into<String>, handle: OperationHandle) -> Self {
        Self::new(label, move || async move { Ok(StartResult::Pending(handle)) })
    }

    /// Wait limits for this job, overriding the tracker's defaults in
    /// sequential runs.
    #[must_use]
    pub fn with_budget(mut self, budget: WaitBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn into_parts(self) -> (String, StartAction, Option<WaitBudget>) {
        (self.label, self.start, self.budget)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label)
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}
