//! Job descriptors and the registry the dispatcher sweeps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use cronhook_core::error::AppError;
use cronhook_core::result::AppResult;

use crate::cron::{CronExpression, Granularity};

/// Lock TTL used when a job does not set one.
pub const DEFAULT_LOCK_EXPIRATION: Duration = Duration::from_secs(60 * 60);

/// The unit of work behind a job.
#[async_trait]
pub trait JobRunner: Send + Sync + std::fmt::Debug {
    /// Run the job once.
    async fn run(&self) -> Result<(), JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job ran and reported failure.
    #[error("Job failed: {0}")]
    Failed(String),

    /// The job panicked.
    #[error("Job panicked: {0}")]
    Panicked(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Per-job execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Await the job before the dispatch report is returned.
    pub should_wait: bool,
    /// TTL of the run lock.
    pub lock_expiration: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            should_wait: false,
            lock_expiration: DEFAULT_LOCK_EXPIRATION,
        }
    }
}

/// A named, scheduled job.
#[derive(Debug)]
pub struct JobDescriptor {
    name: String,
    cron: String,
    schedule: Option<CronExpression>,
    runner: Arc<dyn JobRunner>,
    options: JobOptions,
}

impl JobDescriptor {
    /// Create a descriptor, parsing its cron expression once.
    ///
    /// A malformed expression is logged here and the job is never due on
    /// schedule; it can still be run by name.
    pub fn new(
        name: impl Into<String>,
        cron: impl Into<String>,
        runner: Arc<dyn JobRunner>,
        options: JobOptions,
    ) -> Self {
        let name = name.into();
        let cron = cron.into();
        let schedule = match CronExpression::parse(&cron) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!(
                    job = %name,
                    cron = %cron,
                    error = %e,
                    "Invalid cron expression, job will only run when requested by name"
                );
                None
            }
        };

        Self {
            name,
            cron,
            schedule,
            runner,
            options,
        }
    }

    /// Unique job name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cron expression as configured.
    pub fn cron(&self) -> &str {
        &self.cron
    }

    /// Parsed schedule, `None` if the expression is malformed.
    pub fn schedule(&self) -> Option<&CronExpression> {
        self.schedule.as_ref()
    }

    /// Execution options.
    pub fn options(&self) -> JobOptions {
        self.options
    }

    /// The job's work.
    pub fn runner(&self) -> &Arc<dyn JobRunner> {
        &self.runner
    }

    /// Whether the schedule matches `now` to the minute.
    pub fn is_due(&self, now: &DateTime<Utc>) -> bool {
        self.schedule
            .as_ref()
            .is_some_and(|schedule| schedule.matches(now, Granularity::Minute))
    }
}

/// Ordered, immutable set of jobs with unique names.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<JobDescriptor>>,
    index: HashMap<String, usize>,
}

impl JobRegistry {
    /// Build a registry; order is kept as given.
    ///
    /// Fails on the first duplicate name.
    pub fn new(descriptors: impl IntoIterator<Item = JobDescriptor>) -> AppResult<Self> {
        let mut jobs = Vec::new();
        let mut index = HashMap::new();

        for descriptor in descriptors {
            if index.contains_key(descriptor.name()) {
                return Err(AppError::conflict(format!(
                    "Duplicate job name '{}'",
                    descriptor.name()
                )));
            }
            index.insert(descriptor.name().to_string(), jobs.len());
            jobs.push(Arc::new(descriptor));
        }

        info!(count = jobs.len(), "Job registry loaded");
        Ok(Self { jobs, index })
    }

    /// Look up a job by name.
    pub fn get(&self, name: &str) -> Option<&Arc<JobDescriptor>> {
        self.index.get(name).map(|&i| &self.jobs[i])
    }

    /// Jobs in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<JobDescriptor>> {
        self.jobs.iter()
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the registry has no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
