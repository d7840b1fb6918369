//! Tracking of multiple asynchronous jobs
//!
//! Jobs are run either one after another, or started together and polled in
//! sweeps under a shared wait budget.

pub mod job;
pub mod tracker;

pub use job::{Job, StartFuture};
pub use tracker::{JobTracker, TrackerConfig};
