//! Example: run a set of notebooks in a workspace and report the outcome
//!
//! Starts one job per notebook item id, polls them as a batch and exits with
//! the run summary's exit code.
//!
//! # Setup
//!
//! Credentials and endpoints come from `fabricflow.toml` and/or
//! `FABRICFLOW_*` variables (`.env` is honoured):
//!
//! ```bash
//! export FABRICFLOW_TENANT_ID=...
//! export FABRICFLOW_CLIENT_ID=...
//! export FABRICFLOW_CLIENT_SECRET=...
//! cargo run -p fabricflow-infra --example deploy_pipeline -- <workspace-id> <item-id>...
//! ```

use anyhow::{bail, Context};
use fabricflow_domain::{ApiRequest, RunSummary};
use fabricflow_infra::{config, init_tracing, FabricClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load().context("loading configuration")?;
    init_tracing(&config.logging)?;

    let mut args = std::env::args().skip(1);
    let Some(workspace) = args.next() else {
        bail!("usage: deploy_pipeline <workspace-id> <item-id>...");
    };
    let items: Vec<String> = args.collect();
    if items.is_empty() {
        bail!("no notebook item ids given");
    }

    let client = FabricClient::from_config(config)?;
    let budget = client.job_budget();

    let jobs = items
        .iter()
        .map(|item| {
            let path = format!("workspaces/{workspace}/items/{item}/jobs/instances");
            let request = ApiRequest::post(format!("{path}?jobType=RunNotebook"));
            client.job(format!("notebook {item}"), request)
        })
        .collect();

    let records = client.tracker().run_batch(jobs, budget.max_wait, budget.poll_interval).await;
    let summary = RunSummary::from_records(records.values());

    for record in records.values() {
        let outcome = &record.outcome;
        tracing::info!(job = %record.label, %outcome, polls = record.polls, "job finished");
    }
    tracing::info!(%summary, "deployment finished");

    std::process::exit(summary.exit_code());
}
