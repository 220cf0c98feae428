//! Jobs that call an HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use crate::registry::{JobExecutionError, JobRunner};

/// Longest response body excerpt kept in a failure message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Calls `method url` and fails on anything but a 2xx response.
#[derive(Debug, Clone)]
pub struct HttpJob {
    client: Client,
    method: Method,
    url: String,
    timeout: Duration,
}

impl HttpJob {
    /// Create an HTTP job sharing `client`.
    pub fn new(client: Client, method: Method, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            method,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl JobRunner for HttpJob {
    async fn run(&self) -> Result<(), JobExecutionError> {
        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| JobExecutionError::Failed(format!("Request to {} failed: {e}", self.url)))?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %self.url, status = status.as_u16(), "Job endpoint responded");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        Err(JobExecutionError::Failed(format!(
            "{} {} returned {status}: {excerpt}",
            self.method, self.url
        )))
    }
}
