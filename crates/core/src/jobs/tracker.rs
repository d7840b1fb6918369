//! Job tracker - runs jobs sequentially or as a polled batch

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fabricflow_domain::config::PollingConfig;
use fabricflow_domain::constants::DEFAULT_MAX_CONCURRENCY;
use fabricflow_domain::{JobId, JobRecord, OperationHandle, OperationOutcome, RunSummary};
use futures::stream::{self, StreamExt};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::job::{Job, StartAction};
use crate::operation::{OperationWaiter, PollResult, StartResult, WaitBudget};

/// Defaults applied by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Budget for sequential jobs that do not carry their own.
    pub default_budget: WaitBudget,
    /// Upper bound on concurrent start requests and concurrent polls.
    pub max_concurrency: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { default_budget: WaitBudget::default(), max_concurrency: DEFAULT_MAX_CONCURRENCY }
    }
}

impl From<&PollingConfig> for TrackerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            default_budget: WaitBudget::new(config.max_wait(), config.resource_interval()),
            max_concurrency: config.max_concurrency,
        }
    }
}

/// Drives many jobs to completion and records each job's outcome.
///
/// One job failing never stops the others: every submitted job gets exactly
/// one [`JobRecord`].
pub struct JobTracker {
    waiter: Arc<OperationWaiter>,
    config: TrackerConfig,
}

/// A job whose start request was accepted and that is being polled.
struct Tracked {
    id: JobId,
    label: String,
    handle: OperationHandle,
    started_at: DateTime<Utc>,
    clock: Instant,
    polls: u32,
}

/// Result of starting one job in a batch.
struct Launched {
    id: JobId,
    label: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    result: StartResult,
}

impl JobTracker {
    pub fn new(waiter: Arc<OperationWaiter>) -> Self {
        Self { waiter, config: TrackerConfig::default() }
    }

    #[must_use]
    pub const fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Run jobs one after another, each waiting for the previous to finish.
    ///
    /// Records come back in submission order.
    pub async fn run_sequential(&self, jobs: Vec<Job>) -> Vec<JobRecord> {
        self.run_sequential_until_cancelled(jobs, &CancellationToken::new()).await
    }

    /// [`run_sequential`](Self::run_sequential) that stops when `cancel`
    /// fires. The job in flight and every job not yet started are recorded
    /// as timed out.
    #[instrument(skip_all, fields(run_id = %Uuid::now_v7(), jobs = jobs.len()))]
    pub async fn run_sequential_until_cancelled(
        &self,
        jobs: Vec<Job>,
        cancel: &CancellationToken,
    ) -> Vec<JobRecord> {
        let mut records = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            let id = JobId::new(index);
            let (label, start, budget) = job.into_parts();
            let budget = budget.unwrap_or(self.config.default_budget);
            let started_at = Utc::now();
            let clock = Instant::now();

            let (outcome, polls) = if cancel.is_cancelled() {
                (OperationOutcome::timed_out(Duration::ZERO), 0)
            } else {
                debug!(job = %label, %id, "starting job");
                match start_job(&label, start, cancel).await {
                    StartResult::Finished(outcome) => (outcome, 0),
                    StartResult::Pending(handle) => {
                        let report = self.waiter.wait_with_report(&handle, budget, cancel).await;
                        (report.outcome, report.polls)
                    }
                }
            };

            records.push(finish(id, label, outcome, polls, started_at, clock.elapsed()));
        }

        info!(summary = %RunSummary::from_records(&records), "sequential run finished");
        records
    }

    /// Start every job, then poll all pending ones in sweeps until each is
    /// terminal or `max_wait` has passed since the run began.
    ///
    /// Jobs still pending when the budget runs out are recorded as timed
    /// out. Per-job budgets are ignored: the batch shares one.
    pub async fn run_batch(
        &self,
        jobs: Vec<Job>,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> BTreeMap<JobId, JobRecord> {
        let budget = WaitBudget::new(max_wait, poll_interval);
        self.run_batch_until_cancelled(jobs, budget, &CancellationToken::new()).await
    }

    /// [`run_batch`](Self::run_batch) that stops polling when `cancel` fires.
    #[instrument(skip_all, fields(run_id = %Uuid::now_v7(), jobs = jobs.len()))]
    pub async fn run_batch_until_cancelled(
        &self,
        jobs: Vec<Job>,
        budget: WaitBudget,
        cancel: &CancellationToken,
    ) -> BTreeMap<JobId, JobRecord> {
        let run_clock = Instant::now();
        let deadline = run_clock + budget.max_wait;
        let concurrency = self.config.max_concurrency.max(1);

        let launched: Vec<Launched> = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move {
                let (label, start, _) = job.into_parts();
                let started_at = Utc::now();
                let clock = Instant::now();
                let result = start_job(&label, start, cancel).await;
                Launched { id: JobId::new(index), label, started_at, clock, result }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut records = BTreeMap::new();
        let mut pending = Vec::new();
        for job in launched {
            match job.result {
                StartResult::Finished(outcome) => {
                    let record =
                        finish(job.id, job.label, outcome, 0, job.started_at, job.clock.elapsed());
                    records.insert(job.id, record);
                }
                StartResult::Pending(handle) => pending.push(Tracked {
                    id: job.id,
                    label: job.label,
                    handle,
                    started_at: job.started_at,
                    clock: job.clock,
                    polls: 0,
                }),
            }
        }
        info!(finished = records.len(), pending = pending.len(), "batch started");

        let mut sweep: u32 = 0;
        while !pending.is_empty() {
            let elapsed = run_clock.elapsed();
            if elapsed >= budget.max_wait {
                warn!(remaining = pending.len(), sweeps = sweep, "batch wait budget exhausted");
                break;
            }

            let nap = budget.poll_interval.min(budget.max_wait - elapsed);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(remaining = pending.len(), "batch cancelled");
                    break;
                }
                () = sleep(nap) => {}
            }

            sweep += 1;
            let results = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(remaining = pending.len(), sweep, "batch cancelled during sweep");
                    break;
                }
                results = poll_sweep(&self.waiter, &pending, concurrency) => results,
                () = sleep_until(deadline) => {
                    warn!(remaining = pending.len(), sweep, "batch budget ran out during sweep");
                    break;
                }
            };
            pending = settle(pending, results, &mut records);
            debug!(sweep, remaining = pending.len(), "sweep finished");
        }

        for job in pending {
            let outcome = OperationOutcome::timed_out(job.clock.elapsed());
            records.insert(job.id, job.into_record(outcome));
        }

        info!(summary = %RunSummary::from_records(records.values()), "batch run finished");
        records
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Tracked {
    fn into_record(self, outcome: OperationOutcome) -> JobRecord {
        finish(self.id, self.label, outcome, self.polls, self.started_at, self.clock.elapsed())
    }
}

/// Run a job's start action; errors and cancellation become outcomes.
async fn start_job(label: &str, start: StartAction, cancel: &CancellationToken) -> StartResult {
    let clock = Instant::now();
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            warn!(job = label, "cancelled before the operation was accepted");
            StartResult::Finished(OperationOutcome::timed_out(clock.elapsed()))
        }
        result = start() => match result {
            Ok(started) => started,
            Err(err) => {
                warn!(job = label, error = %err, "failed to start job");
                StartResult::Finished(OperationOutcome::from_error(&err))
            }
        },
    }
}

/// Poll every pending job once, at most `concurrency` at a time.
async fn poll_sweep(
    waiter: &OperationWaiter,
    pending: &[Tracked],
    concurrency: usize,
) -> HashMap<JobId, PollResult> {
    stream::iter(pending)
        .map(|job| async move { (job.id, waiter.poll_once(&job.handle).await) })
        .buffer_unordered(concurrency)
        .collect()
        .await
}

/// Record jobs that reached a terminal state; return the rest.
fn settle(
    pending: Vec<Tracked>,
    mut results: HashMap<JobId, PollResult>,
    records: &mut BTreeMap<JobId, JobRecord>,
) -> Vec<Tracked> {
    let mut still_pending = Vec::with_capacity(pending.len());
    for mut job in pending {
        match results.remove(&job.id) {
            Some(PollResult::Terminal(outcome)) => {
                job.polls += 1;
                records.insert(job.id, job.into_record(outcome));
            }
            Some(PollResult::Pending { .. }) => {
                job.polls += 1;
                still_pending.push(job);
            }
            None => still_pending.push(job),
        }
    }
    still_pending
}

fn finish(
    id: JobId,
    label: String,
    outcome: OperationOutcome,
    polls: u32,
    started_at: DateTime<Utc>,
    duration: Duration,
) -> JobRecord {
    match &outcome {
        OperationOutcome::Completed { .. } => {
            let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
            info!(job = %label, %id, polls, duration_ms, "job completed");
        }
        OperationOutcome::Failed { code, message } => {
            warn!(job = %label, %id, %code, %message, "job failed");
        }
        OperationOutcome::TimedOut { elapsed } => {
            warn!(job = %label, %id, polls, elapsed_secs = elapsed.as_secs(), "job timed out");
        }
    }
    JobRecord { id, label, outcome, duration, polls, started_at }
}
