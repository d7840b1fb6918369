//! Job records and run summaries
//!
//! The job tracker hands these to whatever reports the run. They carry
//! enough to decide an exit status without knowing how polling works.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::OperationOutcome;

/// Identifier assigned by the tracker: the job's position in the submitted
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(usize);

impl JobId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Final record for one tracked job. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub label: String,
    pub outcome: OperationOutcome,
    /// Wall time from start request to terminal state.
    pub duration: Duration,
    /// Status polls issued for this job (0 when it finished immediately).
    pub polls: u32,
    pub started_at: DateTime<Utc>,
}

impl JobRecord {
    pub const fn is_success(&self) -> bool {
        self.outcome.is_completed()
    }
}

/// Aggregate view over a run's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub failed_labels: Vec<String>,
    pub timed_out_labels: Vec<String>,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a JobRecord>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            summary.total_duration += record.duration;
            match record.outcome {
                OperationOutcome::Completed { .. } => summary.completed += 1,
                OperationOutcome::Failed { .. } => {
                    summary.failed += 1;
                    summary.failed_labels.push(record.label.clone());
                }
                OperationOutcome::TimedOut { .. } => {
                    summary.timed_out += 1;
                    summary.timed_out_labels.push(record.label.clone());
                }
            }
        }
        summary
    }

    /// True when every job completed. An empty run counts as success.
    pub const fn is_success(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }

    /// Process exit code for a deployment driver.
    ///
    /// `0` when everything completed, `1` when any job failed, `2` when the
    /// only problems were time-outs.
    pub const fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            1
        } else if self.timed_out > 0 {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} jobs: {} completed, {} failed, {} timed out",
            self.total, self.completed, self.failed, self.timed_out
        )
    }
}
