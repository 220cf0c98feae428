//! A job that only logs, to show the dispatcher is alive.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::registry::{JobExecutionError, JobRunner};

/// Logs an increasing beat counter.
#[derive(Debug)]
pub struct HeartbeatJob {
    name: String,
    beats: AtomicU64,
}

impl HeartbeatJob {
    /// Create a heartbeat logging under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            beats: AtomicU64::new(0),
        }
    }

    /// Beats logged so far.
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl JobRunner for HeartbeatJob {
    async fn run(&self) -> Result<(), JobExecutionError> {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        info!(job = %self.name, beat, "Heartbeat");
        Ok(())
    }
}
