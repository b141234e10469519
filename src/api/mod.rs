//! HTTP surface for the search service.

mod health;
mod search;

pub use search::ApiError;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::limiter::RateLimiter;
use crate::search::SearchService;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(service: Arc<SearchService>, limiter: Arc<RateLimiter>) -> Self {
        Self { service, limiter }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search::search))
        .route("/health", get(health::health_check))
        .with_state(state)
}
