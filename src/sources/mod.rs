//! Source adapters for the three bibliographic backends.
//!
//! Each adapter translates the generic query into its backend's request
//! shape, applies whatever filters the backend understands natively, and
//! normalizes the response into [`PaperRecord`]s. Filters a backend cannot
//! express are applied client-side by [`residual_filter`] before the
//! adapter returns.
//!
//! Adapters report failures as [`SourceError`]; converting those into
//! degraded per-source results is the aggregator's job.

mod openalex;
mod pubmed;
mod semantic;

pub mod mock;

pub use mock::MockAdapter;
pub use openalex::OpenAlexAdapter;
pub use pubmed::PubMedAdapter;
pub use semantic::SemanticScholarAdapter;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{PaperRecord, SearchFilters, SourceHits, SourceId};

/// One external bibliographic backend.
///
/// `search` returns the requested page of normalized records plus the
/// backend's total-count estimate. Implementations must not panic on
/// malformed payloads; anything unexpected becomes a [`SourceError`].
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// Stable identifier used in response payloads and cache entries
    fn id(&self) -> SourceId;

    /// Human-readable name for logs
    fn name(&self) -> &str {
        self.id().name()
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SourceHits, SourceError>;
}

/// Errors that can occur when talking to a backend
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP transport error
    #[error("network error: {0}")]
    Network(String),

    /// Non-success status from the backend
    #[error("api error: {0}")]
    Api(String),

    /// Unparsable payload (JSON or XML)
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

/// Shared HTTP client with the defaults every adapter wants
pub(crate) fn http_client() -> Arc<Client> {
    Arc::new(
        Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client"),
    )
}

/// Filters an adapter pushed down to its backend
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFilters {
    pub open_access: bool,
    pub study_type: bool,
}

/// Apply the filters the backend could not express.
///
/// Open-access filtering keeps only records the source marked open access;
/// study-type filtering does a case-insensitive containment match against
/// the record's publication type.
pub fn residual_filter(
    records: Vec<PaperRecord>,
    filters: &SearchFilters,
    native: NativeFilters,
) -> Vec<PaperRecord> {
    records
        .into_iter()
        .filter(|record| {
            if filters.open_access_only && !native.open_access && !record.open_access {
                return false;
            }
            if let Some(study_type) = &filters.study_type {
                if !native.study_type {
                    let wanted = study_type.to_lowercase();
                    let got = record
                        .publication_type
                        .as_deref()
                        .unwrap_or_default()
                        .to_lowercase();
                    if !got.contains(&wanted) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(open_access: bool, publication_type: Option<&str>) -> PaperRecord {
        let mut r = PaperRecord::new("1", "Some Paper", SourceId::Semantic);
        r.open_access = open_access;
        r.publication_type = publication_type.map(str::to_string);
        r
    }

    #[test]
    fn test_residual_open_access_filter() {
        let filters = SearchFilters {
            open_access_only: true,
            ..Default::default()
        };
        let records = vec![record(true, None), record(false, None)];
        let kept = residual_filter(records, &filters, NativeFilters::default());
        assert_eq!(kept.len(), 1);
        assert!(kept[0].open_access);
    }

    #[test]
    fn test_residual_filter_skipped_when_native() {
        let filters = SearchFilters {
            open_access_only: true,
            ..Default::default()
        };
        let records = vec![record(false, None)];
        let native = NativeFilters {
            open_access: true,
            study_type: false,
        };
        // The backend already filtered; the record's own flag is not
        // consulted again.
        assert_eq!(residual_filter(records, &filters, native).len(), 1);
    }

    #[test]
    fn test_residual_study_type_filter() {
        let filters = SearchFilters {
            study_type: Some("Review".into()),
            ..Default::default()
        };
        let records = vec![
            record(false, Some("Systematic Review")),
            record(false, Some("Clinical Trial")),
            record(false, None),
        ];
        let kept = residual_filter(records, &filters, NativeFilters::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].publication_type.as_deref(), Some("Systematic Review"));
    }
}
