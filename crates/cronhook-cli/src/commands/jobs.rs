//! Job inspection and manual dispatch commands.

use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use cronhook_core::error::AppError;
use cronhook_worker::dispatcher::JobOutcome;

/// Arguments for jobs commands
#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Jobs subcommand
    #[command(subcommand)]
    pub command: JobsCommand,
}

/// Jobs subcommands
#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List configured jobs and whether they are locked
    List,
    /// Run one dispatch cycle in this process and wait for every job
    Run {
        /// Run only this job, ignoring its schedule
        #[arg(short, long)]
        job: Option<String>,
        /// Dispatch as if it were this RFC 3339 instant
        #[arg(long)]
        at: Option<String>,
    },
}

/// One row of `jobs list`.
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cron")]
    cron: String,
    #[tabled(rename = "Wait")]
    should_wait: bool,
    #[tabled(rename = "Lock TTL (s)")]
    lock_expiration_seconds: u64,
    #[tabled(rename = "Next Run")]
    next_run: String,
    #[tabled(rename = "Locked")]
    locked: bool,
}

/// Execute jobs commands
pub async fn execute(
    args: &JobsArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = super::load_config(config_path, env)?;
    let dispatcher = super::build_dispatcher(&config).await?;

    match &args.command {
        JobsCommand::List => {
            let now = Utc::now();
            let mut rows = Vec::new();
            for job in dispatcher.registry().iter() {
                let next_run = match job.schedule() {
                    Some(schedule) => schedule
                        .next_after(&now)
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string()),
                    None => "invalid cron".to_string(),
                };
                rows.push(JobRow {
                    name: job.name().to_string(),
                    cron: job.cron().to_string(),
                    should_wait: job.options().should_wait,
                    lock_expiration_seconds: job.options().lock_expiration.as_secs(),
                    next_run,
                    locked: dispatcher.lock().is_locked(job.name()).await,
                });
            }
            output::print_list(&rows, format);
        }
        JobsCommand::Run { job, at } => {
            let now = match at {
                Some(at) => super::parse_instant(at)?,
                None => Utc::now(),
            };

            let dispatch = dispatcher.dispatch(now, job.as_deref()).await;
            let outcomes = dispatch.deferred.run().await;

            output::print_item(&dispatch.report, format);

            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            for outcome in &outcomes {
                if let JobOutcome::Failed { elapsed, error } = outcome {
                    output::print_error(&format!("{error} (after {:.2}s)", elapsed.as_secs_f64()));
                }
            }
            let slowest = outcomes
                .iter()
                .map(JobOutcome::elapsed)
                .max()
                .unwrap_or_default();
            if failed == 0 {
                output::print_success(&format!(
                    "Dispatch complete: {} awaited, {} deferred ({:.2}s), {} already running",
                    dispatch.report.ran.len(),
                    dispatch.report.to_run.len(),
                    slowest.as_secs_f64(),
                    dispatch.report.already_running.len()
                ));
            } else {
                output::print_warning(&format!("{failed} deferred job(s) failed"));
            }
        }
    }

    Ok(())
}
