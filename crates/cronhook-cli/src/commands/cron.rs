//! Cron expression evaluation command.

use chrono::Utc;
use clap::Args;
use serde::Serialize;

use crate::output::{self, OutputFormat};
use cronhook_core::error::AppError;
use cronhook_worker::cron::{CronExpression, Granularity};

/// Arguments for `cron check`
#[derive(Debug, Args)]
pub struct CronArgs {
    /// Cron subcommand
    #[command(subcommand)]
    pub command: CronCommand,
}

/// Cron subcommands
#[derive(Debug, clap::Subcommand)]
pub enum CronCommand {
    /// Check whether an expression parses and matches an instant
    Check {
        /// Five-field cron expression, quoted
        expression: String,
        /// Instant to test, RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Finest field to compare: minute, hour, day, month or weekday
        #[arg(short, long, default_value = "minute")]
        granularity: Granularity,
    },
}

#[derive(Debug, Serialize)]
struct CheckResult {
    expression: String,
    at: String,
    granularity: String,
    matches: bool,
    next_run: Option<String>,
}

/// Execute cron commands
pub fn execute(args: &CronArgs, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        CronCommand::Check {
            expression,
            at,
            granularity,
        } => {
            let schedule = CronExpression::parse(expression).map_err(|e| {
                AppError::validation(format!("Invalid cron expression '{expression}': {e}"))
            })?;
            let at = match at {
                Some(at) => super::parse_instant(at)?,
                None => Utc::now(),
            };

            let result = CheckResult {
                expression: schedule.as_str().to_string(),
                at: at.to_rfc3339(),
                granularity: format!("{granularity:?}").to_lowercase(),
                matches: schedule.matches(&at, *granularity),
                next_run: schedule.next_after(&at).map(|next| next.to_rfc3339()),
            };

            match format {
                OutputFormat::Json => output::print_item(&result, format),
                OutputFormat::Table => {
                    output::print_kv("Expression", &result.expression);
                    output::print_kv("At", &result.at);
                    output::print_kv("Granularity", &result.granularity);
                    output::print_kv("Matches", &result.matches.to_string());
                    output::print_kv(
                        "Next run",
                        result.next_run.as_deref().unwrap_or("never"),
                    );
                }
            }
        }
    }

    Ok(())
}
