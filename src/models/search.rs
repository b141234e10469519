//! Search request and response models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{PaperRecord, SourceId};

/// Minimum query length accepted by the search endpoint
pub const MIN_QUERY_LEN: usize = 2;

/// How the merged result set is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Keep aggregator order; sources already rank by relevance
    Relevance,
    /// Year descending, missing year last
    Newest,
    /// Citation count descending
    Citations,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::Relevance
    }
}

impl SortMode {
    /// Stable token used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Relevance => "relevance",
            SortMode::Newest => "newest",
            SortMode::Citations => "citations",
        }
    }
}

/// Filters applied to one search request; immutable for its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub study_type: Option<String>,
    pub open_access_only: bool,
    pub human_only: bool,
}

impl SearchFilters {
    /// Serialize with sorted keys for cache-key material
    ///
    /// Routed through `serde_json::Value` so key order is alphabetical
    /// rather than declaration order.
    pub fn canonical_json(&self) -> String {
        serde_json::to_value(self)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// Body of `POST /api/search`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,

    #[serde(default)]
    pub filters: SearchFilters,

    #[serde(default)]
    pub sort: SortMode,

    #[serde(default = "default_page")]
    pub page: usize,
}

fn default_page() -> usize {
    1
}

/// What one adapter produced for a request: the requested page of records
/// plus the backend's own estimate of the total match count.
#[derive(Debug, Clone)]
pub struct SourceHits {
    pub records: Vec<PaperRecord>,
    pub total: usize,
}

/// Outcome of one source within a federated search
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: SourceId,
    pub success: bool,
    pub records: Vec<PaperRecord>,
    pub total: usize,
    pub error: Option<String>,
}

impl SourceResult {
    pub fn ok(source: SourceId, hits: SourceHits) -> Self {
        Self {
            source,
            success: true,
            records: hits.records,
            total: hits.total,
            error: None,
        }
    }

    pub fn failed(source: SourceId, error: impl Into<String>) -> Self {
        Self {
            source,
            success: false,
            records: Vec::new(),
            total: 0,
            error: Some(error.into()),
        }
    }
}

/// Per-source status entry in the response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full search response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<PaperRecord>,

    /// Estimate: combined per-source totals scaled by the dedup ratio
    pub total_results: usize,

    pub page: usize,

    pub total_pages: usize,

    /// One entry per queried source, keyed by source id
    pub sources: BTreeMap<String, SourceStatus>,

    pub cached: bool,
}
