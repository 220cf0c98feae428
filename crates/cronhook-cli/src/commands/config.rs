//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use cronhook_cache::redis::client::mask_redis_url;
use cronhook_core::config::AppConfig;
use cronhook_core::error::AppError;
use cronhook_worker::jobs::build_registry;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration and job definitions
    Validate,
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    env: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let mut config = super::load_config(config_path, env)?;
            redact(&mut config);
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => {
            let config = match validate(config_path, env) {
                Ok(config) => config,
                Err(e) => {
                    output::print_error(&format!("Configuration invalid: {}", e));
                    return Err(e);
                }
            };

            output::print_success(&format!("Configuration '{}' is valid", config_path));
            let mut summary = vec![("Environment", config.environment.clone())];
            summary.push((
                "Server",
                format!("{}:{}", config.server.host, config.server.port),
            ));
            summary.push(("Lock store", config.cache.provider.clone()));
            if config.cache.provider == "redis" {
                summary.push(("Redis", mask_redis_url(&config.cache.redis.url)));
            }
            summary.push(("Locking", config.locking_enabled().to_string()));
            summary.push(("Ticker", config.worker.ticker_enabled.to_string()));
            summary.push(("Jobs", config.jobs.definitions.len().to_string()));
            summary.push((
                "Webhook token",
                if config.webhook.token.is_some() { "set" } else { "unset" }.to_string(),
            ));
            for (key, value) in &summary {
                output::print_kv(key, value);
            }

            if config.webhook.token.is_none() && config.is_production() {
                output::print_warning("No webhook token: every webhook call will be refused");
            }
        }
    }

    Ok(())
}

/// Load the configuration and build the job registry from it.
fn validate(config_path: &str, env: &str) -> Result<AppConfig, AppError> {
    let config = super::load_config(config_path, env)?;
    build_registry(&config.jobs, &reqwest::Client::new())?;
    Ok(config)
}

fn redact(config: &mut AppConfig) {
    config.cache.redis.url = mask_redis_url(&config.cache.redis.url);
    if config.webhook.token.is_some() {
        config.webhook.token = Some("****".to_string());
    }
}
