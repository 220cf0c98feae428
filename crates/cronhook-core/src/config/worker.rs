//! Background worker and job definition configuration.

use serde::{Deserialize, Serialize};

/// In-process trigger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Dispatch once a minute from inside the server instead of waiting
    /// for an external scheduler to call the webhook.
    #[serde(default)]
    pub ticker_enabled: bool,
}

/// Job registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Force lock enforcement on or off. When unset, locks are enforced
    /// only in production.
    #[serde(default)]
    pub locking: Option<bool>,
    /// Lock TTL for jobs that do not set their own.
    #[serde(default = "default_lock_expiration")]
    pub default_lock_expiration_seconds: u64,
    /// Job definitions, in dispatch order.
    #[serde(default)]
    pub definitions: Vec<JobDefinition>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            locking: None,
            default_lock_expiration_seconds: default_lock_expiration(),
            definitions: Vec::new(),
        }
    }
}

/// What a configured job does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Call an HTTP endpoint; non-2xx responses fail the job.
    Http,
    /// Log a heartbeat line.
    Heartbeat,
}

/// A single configured job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique job name, also the lock key suffix.
    pub name: String,
    /// Five-field cron expression (a leading seconds field is accepted).
    pub cron: String,
    /// Job kind.
    pub kind: JobKind,
    /// Await the job before the webhook responds.
    #[serde(default)]
    pub should_wait: bool,
    /// Lock TTL override in seconds.
    #[serde(default)]
    pub lock_expiration_seconds: Option<u64>,
    /// Target URL (`http` jobs only).
    #[serde(default)]
    pub url: Option<String>,
    /// HTTP method (`http` jobs only).
    #[serde(default = "default_method")]
    pub method: String,
    /// Request timeout in seconds (`http` jobs only).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_lock_expiration() -> u64 {
    3600
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_timeout() -> u64 {
    300
}
