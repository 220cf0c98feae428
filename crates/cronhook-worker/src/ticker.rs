//! In-process trigger that runs a dispatch cycle every minute.

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info};

use cronhook_core::error::AppError;

use crate::dispatcher::Dispatcher;

/// Fires at second zero of every minute.
pub const EVERY_MINUTE: &str = "0 * * * * *";

/// Minute ticker calling [`Dispatcher::dispatch_now`].
pub struct DispatchTicker {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for DispatchTicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTicker").finish()
    }
}

impl DispatchTicker {
    /// Create the ticker and register its minute job.
    pub async fn new(dispatcher: Dispatcher) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        let job = CronJob::new_async(EVERY_MINUTE, move |_uuid, _lock| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move {
                let dispatch = dispatcher.dispatch_now(None).await;
                if dispatch.deferred.is_empty() {
                    return;
                }
                // Keeps this tick alive until its deferred jobs finish.
                if let Err(e) = dispatch.deferred.spawn().await {
                    error!("Deferred jobs task failed: {e}");
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create dispatch schedule: {e}")))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add dispatch schedule: {e}")))?;

        debug!(schedule = EVERY_MINUTE, "Registered dispatch ticker");
        Ok(Self { scheduler })
    }

    /// Start ticking.
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        info!("Dispatch ticker started");
        Ok(())
    }

    /// Stop ticking. Runs already in flight are not cancelled.
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        info!("Dispatch ticker shut down");
        Ok(())
    }
}
