//! # cronhook-api
//!
//! HTTP API layer for cronhook built on Axum.
//!
//! Provides the run-jobs webhook, the job listing, health checks, webhook
//! token middleware, request logging and error mapping.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
