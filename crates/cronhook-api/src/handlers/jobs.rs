//! Run-jobs webhook and job listing handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use chrono::Utc;
use tracing::{debug, error};
use validator::Validate;

use cronhook_core::error::AppError;

use crate::dto::request::{RunJobsBody, RunJobsQuery, RunJobsRequest};
use crate::dto::response::{ApiResponse, JobSummary, RunJobsResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET|POST /api/webhooks/run-jobs
///
/// Runs one dispatch cycle. Jobs that must be awaited finish before the
/// response; the rest are started in the background once it is built.
pub async fn run_jobs(
    State(state): State<AppState>,
    query: Result<Query<RunJobsQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Json<RunJobsResponse>, ApiError> {
    let request = parse_request(query, &body)?;
    request
        .validate()
        .map_err(|e| AppError::validation(format!("Invalid run-jobs request: {e}")))?;

    let dispatch = state.dispatcher.dispatch_now(request.run.as_deref()).await;

    if !dispatch.deferred.is_empty() {
        debug!(count = dispatch.deferred.len(), "Starting deferred jobs");
        let deferred = dispatch.deferred;
        state.tasks.spawn(async move {
            let outcomes = deferred.run().await;
            let failed = outcomes.iter().filter(|o| !o.is_success()).count();
            if failed > 0 {
                error!(failed, "Deferred jobs finished with failures");
            }
        });
    }

    Ok(Json(RunJobsResponse {
        ok: true,
        report: dispatch.report,
    }))
}

/// GET /api/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<ApiResponse<Vec<JobSummary>>> {
    let now = Utc::now();
    let lock = state.dispatcher.lock();
    let mut jobs = Vec::with_capacity(state.dispatcher.registry().len());

    for job in state.dispatcher.registry().iter() {
        jobs.push(JobSummary {
            name: job.name().to_string(),
            cron: job.cron().to_string(),
            should_wait: job.options().should_wait,
            lock_expiration_seconds: job.options().lock_expiration.as_secs(),
            schedule_valid: job.schedule().is_some(),
            next_run: job.schedule().and_then(|s| s.next_after(&now)),
            locked: lock.is_locked(job.name()).await,
        });
    }

    Json(ApiResponse::ok(jobs))
}

/// The `run` query parameter wins over a JSON body.
fn parse_request(
    query: Result<Query<RunJobsQuery>, QueryRejection>,
    body: &[u8],
) -> Result<RunJobsRequest, AppError> {
    let Query(query) =
        query.map_err(|e| AppError::validation(format!("Invalid query string: {e}")))?;

    if query.run.is_some() || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunJobsRequest { run: query.run });
    }

    let body: RunJobsBody = serde_json::from_slice(body)
        .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?;
    Ok(RunJobsRequest { run: body.run })
}
