//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod cache;
pub mod logging;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::{ServerConfig, WebhookConfig};
pub use self::cache::{CacheConfig, MemoryCacheConfig, RedisCacheConfig};
pub use self::logging::LoggingConfig;
pub use self::worker::{JobDefinition, JobKind, JobsConfig, WorkerConfig};

use crate::error::AppError;

/// Environment name that turns on lock enforcement and strict webhook auth.
pub const PRODUCTION: &str = "production";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment (`development`, `production`, ...).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Lock store provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Webhook authentication settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// In-process trigger settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Job registry settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl AppConfig {
    /// Load configuration starting from an explicit base file.
    ///
    /// Merges the base file with the `{env}` overlay next to it and
    /// environment variables prefixed with `CRONHOOK__`.
    pub fn load_from(base: &str, env: &str) -> Result<Self, AppError> {
        let overlay = std::path::Path::new(base)
            .with_file_name(env)
            .to_string_lossy()
            .into_owned();

        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&overlay).required(false))
            .add_source(
                config::Environment::with_prefix("CRONHOOK")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", env)
            .map_err(|e| AppError::configuration(format!("Failed to set environment: {e}")))?
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Whether this deployment runs in production mode.
    pub fn is_production(&self) -> bool {
        self.environment == PRODUCTION
    }

    /// Whether job locks are enforced against the lock store.
    pub fn locking_enabled(&self) -> bool {
        self.jobs.locking.unwrap_or_else(|| self.is_production())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            webhook: WebhookConfig::default(),
            worker: WorkerConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.provider, "memory");
        assert_eq!(config.cache.redis.key_prefix, "");
        assert_eq!(config.jobs.default_lock_expiration_seconds, 3600);
        assert!(config.jobs.definitions.is_empty());
        assert!(!config.worker.ticker_enabled);
        assert!(!config.locking_enabled());
    }

    #[test]
    fn test_job_definitions() {
        let config = AppConfig::from_toml(
            r#"
            [[jobs.definitions]]
            name = "update-metrics"
            cron = "*/5 * * * *"
            kind = "http"
            url = "http://app.internal/jobs/update-metrics"
            should_wait = true

            [[jobs.definitions]]
            name = "heartbeat"
            cron = "* * * * *"
            kind = "heartbeat"
            lock_expiration_seconds = 30
            "#,
        )
        .unwrap();

        let defs = &config.jobs.definitions;
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].kind, JobKind::Http);
        assert_eq!(defs[0].method, "POST");
        assert_eq!(defs[0].timeout_seconds, 300);
        assert!(defs[0].should_wait);
        assert_eq!(defs[0].lock_expiration_seconds, None);
        assert_eq!(defs[1].kind, JobKind::Heartbeat);
        assert!(!defs[1].should_wait);
        assert_eq!(defs[1].lock_expiration_seconds, Some(30));
    }

    #[test]
    fn test_locking_follows_environment_unless_overridden() {
        let mut config = AppConfig::from_toml(r#"environment = "production""#).unwrap();
        assert!(config.is_production());
        assert!(config.locking_enabled());

        config.jobs.locking = Some(false);
        assert!(!config.locking_enabled());

        config.environment = "staging".to_string();
        config.jobs.locking = Some(true);
        assert!(config.locking_enabled());
    }

    #[test]
    fn test_unknown_job_kind_is_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [[jobs.definitions]]
            name = "x"
            cron = "* * * * *"
            kind = "shell"
            "#,
        );
        assert!(result.is_err());
    }
}
