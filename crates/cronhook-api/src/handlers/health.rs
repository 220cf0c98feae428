//! Health check handlers.

use axum::Json;
use axum::extract::State;

use cronhook_core::traits::cache::CacheProvider;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let reachable = match state.cache.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "Lock store health check failed");
            false
        }
    };

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if reachable { "ok" } else { "degraded" }.to_string(),
        cache_provider: state.cache.kind().to_string(),
        cache: if reachable { "connected" } else { "unreachable" }.to_string(),
        locking: state.dispatcher.lock().is_enabled(),
        jobs: state.dispatcher.registry().len(),
    }))
}
