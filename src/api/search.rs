//! The search endpoint.

use axum::extract::{ConnectInfo, State};
use axum::http::header::{HeaderName, RETRY_AFTER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;
use tracing::error;

use crate::api::AppState;
use crate::limiter::RateLimitDecision;
use crate::models::{SearchRequest, SearchResponse, MIN_QUERY_LEN};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate-limit category for the search endpoint
const SEARCH_CATEGORY: &str = "search";

/// POST /api/search
///
/// Upstream source failures never surface as a non-2xx status; they appear
/// as degraded entries in the response's `sources` map.
pub async fn search(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.trim().len() < MIN_QUERY_LEN {
        return Err(ApiError::Validation(format!(
            "query must be at least {} characters",
            MIN_QUERY_LEN
        )));
    }

    // Identity for rate limiting: authenticated caller id when the session
    // layer provided one, otherwise the client address.
    let identity = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string());

    let decision = state.limiter.check(SEARCH_CATEGORY, &identity).await;
    if !decision.allowed {
        return Err(ApiError::RateLimited(decision));
    }

    // The pipeline runs on its own task so an unexpected fault in
    // merge/sort/assembly surfaces as a 500 instead of a hung connection.
    let service = state.service.clone();
    match tokio::spawn(async move { service.search(&request).await }).await {
        Ok(response) => Ok(Json(response)),
        Err(join_error) => {
            error!(%join_error, "search pipeline task failed");
            Err(ApiError::Internal)
        }
    }
}

/// Errors surfaced by the search endpoint
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request; safe to echo the message
    Validation(String),
    /// Caller exceeded the request budget for the current window
    RateLimited(RateLimitDecision),
    /// Unexpected fault; details stay in the logs
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => {
                let body = Json(json!({ "error": message }));
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::RateLimited(decision) => {
                let mut headers = HeaderMap::new();
                headers.insert(RETRY_AFTER, decision.retry_after().into());
                headers.insert(X_RATELIMIT_LIMIT, decision.limit.into());
                headers.insert(X_RATELIMIT_REMAINING, decision.remaining.into());
                headers.insert(X_RATELIMIT_RESET, decision.reset_at.into());
                let body = Json(json!({ "error": "rate limit exceeded" }));
                (StatusCode::TOO_MANY_REQUESTS, headers, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
