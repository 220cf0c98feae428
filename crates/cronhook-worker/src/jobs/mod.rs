//! Built-in job kinds and the registry builder for configured jobs.

pub mod heartbeat;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};

use cronhook_core::config::{JobDefinition, JobKind, JobsConfig};
use cronhook_core::error::AppError;
use cronhook_core::result::AppResult;

use crate::registry::{JobDescriptor, JobOptions, JobRegistry, JobRunner};

pub use heartbeat::HeartbeatJob;
pub use http::HttpJob;

/// Build the registry from configured definitions, in config order.
///
/// `http` jobs share `client`. Fails on a missing url, a bad method or a
/// duplicate name. Malformed cron expressions are not an error here.
pub fn build_registry(config: &JobsConfig, client: &Client) -> AppResult<JobRegistry> {
    let default_lock = Duration::from_secs(config.default_lock_expiration_seconds);

    let descriptors = config
        .definitions
        .iter()
        .map(|definition| build_descriptor(definition, client, default_lock))
        .collect::<AppResult<Vec<_>>>()?;

    JobRegistry::new(descriptors)
}

fn build_descriptor(
    definition: &JobDefinition,
    client: &Client,
    default_lock: Duration,
) -> AppResult<JobDescriptor> {
    let runner: Arc<dyn JobRunner> = match definition.kind {
        JobKind::Heartbeat => Arc::new(HeartbeatJob::new(&definition.name)),
        JobKind::Http => {
            let url = definition.url.as_deref().ok_or_else(|| {
                AppError::configuration(format!(
                    "Job '{}' is an http job but has no url",
                    definition.name
                ))
            })?;
            let method = definition
                .method
                .to_ascii_uppercase()
                .parse::<Method>()
                .map_err(|e| {
                    AppError::configuration(format!(
                        "Job '{}' has invalid method '{}': {e}",
                        definition.name, definition.method
                    ))
                })?;
            Arc::new(HttpJob::new(
                client.clone(),
                method,
                url,
                Duration::from_secs(definition.timeout_seconds),
            ))
        }
    };

    let lock_expiration = definition
        .lock_expiration_seconds
        .map(Duration::from_secs)
        .unwrap_or(default_lock);
    if lock_expiration.is_zero() {
        return Err(AppError::configuration(format!(
            "Job '{}' has a zero lock expiration",
            definition.name
        )));
    }

    let options = JobOptions {
        should_wait: definition.should_wait,
        lock_expiration,
    };

    Ok(JobDescriptor::new(
        &definition.name,
        &definition.cron,
        runner,
        options,
    ))
}
