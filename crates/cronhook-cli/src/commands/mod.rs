//! CLI command definitions and dispatch.

pub mod config;
pub mod cron;
pub mod jobs;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use cronhook_cache::CacheManager;
use cronhook_core::config::AppConfig;
use cronhook_core::error::AppError;
use cronhook_worker::Dispatcher;
use cronhook_worker::jobs::build_registry;
use cronhook_worker::lock::JobLock;

/// cronhook: scheduled job dispatcher behind a webhook
#[derive(Debug, Parser)]
#[command(name = "cronhook", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file; the environment overlay is read from the same directory
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Deployment environment
    #[arg(short, long, env = "CRONHOOK_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Inspect and run configured jobs
    Jobs(jobs::JobsArgs),
    /// Evaluate a cron expression
    Cron(cron::CronArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Jobs(args) => jobs::execute(args, &self.config, &self.env, self.format).await,
            Commands::Cron(args) => cron::execute(args, self.format),
            Commands::Config(args) => {
                config::execute(args, &self.config, &self.env, self.format).await
            }
        }
    }
}

/// Helper: load configuration for `env`
pub fn load_config(config_path: &str, env: &str) -> Result<AppConfig, AppError> {
    AppConfig::load_from(config_path, env)
}

/// Helper: build a dispatcher from configuration, connecting to the lock store
pub async fn build_dispatcher(config: &AppConfig) -> Result<Dispatcher, AppError> {
    let client = reqwest::Client::new();
    let registry = Arc::new(build_registry(&config.jobs, &client)?);
    let cache = Arc::new(CacheManager::new(&config.cache).await?);
    let lock = JobLock::new(cache, config.locking_enabled());
    Ok(Dispatcher::new(registry, lock))
}

/// Helper: parse an RFC 3339 instant given on the command line
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| AppError::validation(format!("Invalid timestamp '{value}': {e}")))
}
