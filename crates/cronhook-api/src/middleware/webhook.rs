//! Shared-token check for webhook routes.

use axum::extract::{Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use cronhook_core::error::AppError;

use crate::dto::request::TokenQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// Require the webhook token as `?token=` or `Authorization: Bearer`.
///
/// With no token configured the check is skipped, except in production
/// where every request is refused.
pub async fn require_webhook_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.webhook.token.as_deref() else {
        if state.config.is_production() {
            warn!("Webhook token is not configured, refusing request");
            return ApiError(AppError::authentication("Webhook token is not configured"))
                .into_response();
        }
        return next.run(request).await;
    };

    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let presented = query.token.as_deref().or(bearer);
    if !presented.is_some_and(|token| token_matches(token, expected)) {
        warn!(path = %request.uri().path(), "Rejected webhook call with a missing or wrong token");
        return ApiError(AppError::authentication("Invalid webhook token")).into_response();
    }

    next.run(request).await
}

/// Compare tokens in time independent of where they first differ.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cres", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("s3cret-and-more", "s3cret"));
        assert!(!token_matches("", "s3cret"));
    }
}
