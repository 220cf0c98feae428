//! Route definitions for the cronhook HTTP API.
//!
//! All routes are mounted under `/api`. Webhook and job routes sit behind
//! the webhook token check; health routes are open.

use axum::{Router, extract::Request, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(webhook_routes(state.clone()))
        .merge(health_routes());

    // Query strings can carry the webhook token; spans record the path only.
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    Router::new()
        .nest("/api", api_routes)
        .layer(trace)
        .layer(axum_middleware::from_fn(
            middleware::logging::request_logging,
        ))
        .with_state(state)
}

/// Token-guarded endpoints: run-jobs webhook and job listing
fn webhook_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/webhooks/run-jobs",
            get(handlers::jobs::run_jobs).post(handlers::jobs::run_jobs),
        )
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::webhook::require_webhook_token,
        ))
}

/// Health endpoints
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}
