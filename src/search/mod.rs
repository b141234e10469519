//! The federated search pipeline.
//!
//! One request flows: cache read -> concurrent fan-out -> dedup/merge ->
//! sort -> response assembly -> detached cache write. All merge state is
//! request-local; the cache and the rate limiter are the only shared
//! state.

pub mod aggregate;
pub mod dedup;
pub mod sort;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{cache_key, SearchCache};
use crate::models::{SearchRequest, SearchResponse, SourceStatus};
use crate::sources::SourceAdapter;

/// Orchestrates one search request end to end
#[derive(Debug)]
pub struct SearchService {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cache: Arc<SearchCache>,
    page_size: usize,
    source_timeout: Duration,
}

impl SearchService {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cache: Arc<SearchCache>,
        page_size: usize,
        source_timeout: Duration,
    ) -> Self {
        Self {
            adapters,
            cache,
            page_size: page_size.max(1),
            source_timeout,
        }
    }

    /// Execute a validated search request.
    ///
    /// Upstream failures degrade to per-source status entries; this method
    /// itself only fails on a programming error, which the HTTP layer
    /// catches at the request boundary.
    pub async fn search(&self, request: &SearchRequest) -> SearchResponse {
        let page = request.page.max(1);
        let key = cache_key(&request.query, &request.filters, request.sort, page);

        if let Some(mut hit) = self.cache.get(&key) {
            hit.cached = true;
            return hit;
        }

        let outcomes = aggregate::fan_out(
            &self.adapters,
            &request.query,
            &request.filters,
            page,
            self.page_size,
            self.source_timeout,
        )
        .await;

        let mut statuses: BTreeMap<String, SourceStatus> = BTreeMap::new();
        let mut combined = Vec::new();
        let mut total_sum = 0usize;
        for outcome in outcomes {
            statuses.insert(
                outcome.source.id().to_string(),
                SourceStatus {
                    success: outcome.success,
                    count: outcome.records.len(),
                    error: outcome.error,
                },
            );
            if outcome.success {
                total_sum += outcome.total;
                combined.extend(outcome.records);
            }
        }

        // Records without a title never reach the caller.
        combined.retain(|record| !record.title.trim().is_empty());
        let combined_len = combined.len();

        let mut merged = dedup::dedupe_and_merge(combined);
        sort::sort_records(&mut merged, request.sort);

        // Total estimate: combined backend totals scaled by how much this
        // page deduplicated. Known to drift across pages under skewed
        // overlap.
        let dedup_ratio = if combined_len == 0 {
            1.0
        } else {
            merged.len() as f64 / combined_len as f64
        };
        let total_results = (total_sum as f64 * dedup_ratio).round() as usize;
        let total_pages = (total_results.div_ceil(self.page_size)).max(1);

        debug!(
            query_len = request.query.len(),
            page,
            merged = merged.len(),
            combined = combined_len,
            total_results,
            "assembled search response"
        );

        let response = SearchResponse {
            results: merged,
            total_results,
            page,
            total_pages,
            sources: statuses,
            cached: false,
        };

        // Responses with no successful source are not worth remembering.
        if response.sources.values().any(|s| s.success) {
            Arc::clone(&self.cache).store_detached(key, response.clone());
        }

        response
    }
}
