//! Fakes shared by the unit tests of this crate.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Barrier, Notify};

use cronhook_core::error::AppError;
use cronhook_core::result::AppResult;
use cronhook_core::traits::cache::CacheProvider;

use crate::registry::{JobExecutionError, JobRunner};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Counts its runs and then succeeds, fails or panics.
#[derive(Debug)]
pub struct CountingJob {
    runs: AtomicUsize,
    behavior: Behavior,
}

impl CountingJob {
    fn with(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            runs: AtomicUsize::new(0),
            behavior,
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::with(Behavior::Succeed)
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Behavior::Fail)
    }

    pub fn panicking() -> Arc<Self> {
        Self::with(Behavior::Panic)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRunner for CountingJob {
    async fn run(&self) -> Result<(), JobExecutionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(JobExecutionError::Failed("boom".to_string())),
            Behavior::Panic => panic!("job exploded"),
        }
    }
}

/// Signals when it starts, then blocks until released.
#[derive(Debug, Default)]
pub struct GateJob {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl JobRunner for GateJob {
    async fn run(&self) -> Result<(), JobExecutionError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

/// Waits on a shared barrier, so it only finishes if its peers run at the same time.
#[derive(Debug)]
pub struct BarrierJob(pub Arc<Barrier>);

#[async_trait]
impl JobRunner for BarrierJob {
    async fn run(&self) -> Result<(), JobExecutionError> {
        self.0.wait().await;
        Ok(())
    }
}

/// Records the value of a store key while the job is running.
#[derive(Debug)]
pub struct LockProbe {
    pub store: Arc<dyn CacheProvider>,
    pub key: String,
    pub seen: Mutex<Option<Option<String>>>,
}

#[async_trait]
impl JobRunner for LockProbe {
    async fn run(&self) -> Result<(), JobExecutionError> {
        let value = self.store.get(&self.key).await?;
        *self.seen.lock().unwrap() = Some(value);
        Ok(())
    }
}

/// A store whose every operation fails.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl CacheProvider for FailingStore {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::cache("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Err(AppError::cache("connection refused"))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Err(AppError::cache("connection refused"))
    }
}
