//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cronhook_worker::RunReport;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Body of a run-jobs webhook response.
#[derive(Debug, Clone, Serialize)]
pub struct RunJobsResponse {
    /// Always true; job failures do not fail the request.
    pub ok: bool,
    /// What the dispatch cycle did.
    #[serde(flatten)]
    pub report: RunReport,
}

/// One registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job name.
    pub name: String,
    /// Cron expression as configured.
    pub cron: String,
    /// Whether the webhook awaits this job before responding.
    pub should_wait: bool,
    /// Lock TTL.
    pub lock_expiration_seconds: u64,
    /// Whether the cron expression parsed.
    pub schedule_valid: bool,
    /// Next scheduled run, if the schedule is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    /// Whether a run currently holds the job's lock.
    pub locked: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status.
    pub status: String,
    /// Version.
    pub version: String,
    /// Uptime.
    pub uptime_seconds: u64,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// Overall status.
    pub status: String,
    /// Lock store provider.
    pub cache_provider: String,
    /// Lock store status.
    pub cache: String,
    /// Whether job locks are enforced.
    pub locking: bool,
    /// Registered jobs.
    pub jobs: usize,
}
