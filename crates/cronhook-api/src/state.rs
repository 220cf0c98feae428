//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::task::TaskTracker;

use cronhook_cache::CacheManager;
use cronhook_core::config::AppConfig;
use cronhook_worker::Dispatcher;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Lock store, for health reporting
    pub cache: Arc<CacheManager>,
    /// Dispatch cycles over the configured registry
    pub dispatcher: Dispatcher,
    /// Deferred job batches still running after their response was sent
    pub tasks: TaskTracker,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    /// Create state with a fresh task tracker, started now.
    pub fn new(config: Arc<AppConfig>, cache: Arc<CacheManager>, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            cache,
            dispatcher,
            tasks: TaskTracker::new(),
            started_at: Instant::now(),
        }
    }
}
