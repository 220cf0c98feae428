//! cronhook server: scheduled job dispatcher behind a webhook.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use cronhook_cache::CacheManager;
use cronhook_core::config::AppConfig;
use cronhook_core::error::AppError;
use cronhook_worker::jobs::build_registry;
use cronhook_worker::lock::JobLock;
use cronhook_worker::{Dispatcher, DispatchTicker};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("CRONHOOK_CONFIG").unwrap_or_else(|_| "config/default".to_string());
    let env = std::env::var("CRONHOOK_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load_from(&config_path, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        environment = %config.environment,
        "Starting cronhook v{}",
        env!("CARGO_PKG_VERSION")
    );

    // ── Step 1: Initialize lock store ────────────────────────────
    tracing::info!(
        "Initializing lock store (provider: {})...",
        config.cache.provider
    );
    let cache = Arc::new(CacheManager::new(&config.cache).await?);

    // ── Step 2: Build job registry ───────────────────────────────
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("cronhook/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::internal(format!("HTTP client init failed: {}", e)))?;
    let registry = Arc::new(build_registry(&config.jobs, &http_client)?);

    // ── Step 3: Dispatcher ───────────────────────────────────────
    let locking = config.locking_enabled();
    if !locking {
        tracing::warn!("Job locks are disabled; overlapping triggers may run a job twice");
    }
    let lock = JobLock::new(cache.clone(), locking);
    let dispatcher = Dispatcher::new(registry, lock);

    // ── Step 4: Optional in-process ticker ───────────────────────
    let mut ticker = if config.worker.ticker_enabled {
        let ticker = DispatchTicker::new(dispatcher.clone()).await?;
        ticker.start().await?;
        Some(ticker)
    } else {
        tracing::info!("Ticker disabled, waiting for webhook triggers");
        None
    };

    if config.webhook.token.is_none() {
        if config.is_production() {
            tracing::warn!("No webhook token configured; all webhook calls will be refused");
        } else {
            tracing::warn!("No webhook token configured; webhook calls are not authenticated");
        }
    }

    // ── Step 5: Build and start HTTP server ──────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = cronhook_api::AppState::new(Arc::new(config), cache, dispatcher);
    let tasks = app_state.tasks.clone();
    let app = cronhook_api::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("cronhook server listening on {}", addr);

    // ── Step 6: Graceful shutdown ────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    if let Some(ticker) = ticker.as_mut() {
        ticker.shutdown().await?;
    }

    // ── Step 7: Wait for deferred jobs ───────────────────────────
    tasks.close();
    if !tasks.is_empty() {
        tracing::info!(
            running = tasks.len(),
            "Waiting up to {}s for deferred jobs...",
            grace.as_secs()
        );
    }
    if tokio::time::timeout(grace, tasks.wait()).await.is_err() {
        tracing::warn!(
            running = tasks.len(),
            "Deferred jobs still running at shutdown; their locks expire on their own"
        );
    }

    tracing::info!("cronhook server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
