//! OpenAlex source adapter.
//!
//! Uses the `/works` endpoint. Year range and open-access filters are
//! pushed down as OpenAlex filter expressions; study type is
//! post-filtered. Abstracts arrive as a word -> position-list inverted
//! index and are rebuilt by the normalizer.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{PaperRecord, SearchFilters, SourceHits, SourceId};
use crate::normalize::{normalize_doi, reconstruct_abstract};
use crate::sources::{http_client, residual_filter, NativeFilters, SourceAdapter, SourceError};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// OpenAlex research source
#[derive(Debug, Clone)]
pub struct OpenAlexAdapter {
    client: Arc<Client>,
    base_url: String,
    /// Contact email for the polite pool (better rate limits)
    mailto: Option<String>,
}

impl OpenAlexAdapter {
    pub fn new(mailto: Option<String>) -> Self {
        Self {
            client: http_client(),
            base_url: OPENALEX_API_BASE.to_string(),
            mailto,
        }
    }

    /// Point the adapter at a different host (for tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn build_search_url(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> String {
        let mut url = format!(
            "{}/works?search={}&per-page={}&page={}",
            self.base_url,
            urlencoding::encode(query),
            page_size,
            page.max(1),
        );

        let mut filter_terms: Vec<String> = Vec::new();
        match (filters.year_from, filters.year_to) {
            (Some(from), Some(to)) => filter_terms.push(format!("publication_year:{}-{}", from, to)),
            (Some(from), None) => filter_terms.push(format!("publication_year:{}-", from)),
            (None, Some(to)) => filter_terms.push(format!("publication_year:-{}", to)),
            (None, None) => {}
        }
        if filters.open_access_only {
            filter_terms.push("is_oa:true".to_string());
        }
        if !filter_terms.is_empty() {
            url.push_str(&format!("&filter={}", filter_terms.join(",")));
        }

        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
        }

        url
    }

    fn parse_work(work: OAWork) -> PaperRecord {
        let mut record = PaperRecord::new(
            work.id.unwrap_or_default(),
            work.display_name.unwrap_or_default(),
            SourceId::OpenAlex,
        );
        record.authors = work
            .authorships
            .into_iter()
            .filter_map(|a| a.author.display_name)
            .collect();
        record.journal = work
            .primary_location
            .and_then(|l| l.source)
            .and_then(|s| s.display_name);
        record.year = work.publication_year;
        record.abstract_text = work
            .abstract_inverted_index
            .as_ref()
            .and_then(reconstruct_abstract);
        record.doi = work
            .doi
            .as_deref()
            .map(normalize_doi)
            .filter(|d| !d.is_empty());
        // OpenAlex serves the PMID as a full pubmed.ncbi URL
        record.pmid = work
            .ids
            .and_then(|ids| ids.pmid)
            .and_then(|pmid| match url::Url::parse(&pmid) {
                Ok(parsed) => parsed
                    .path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                    .map(str::to_string),
                Err(_) => Some(pmid),
            })
            .filter(|p| !p.is_empty());
        record.url = record.doi.as_ref().map(|d| format!("https://doi.org/{}", d)).or_else(|| {
            if record.id.is_empty() {
                None
            } else {
                Some(record.id.clone())
            }
        });
        record.open_access = work.open_access.map(|oa| oa.is_oa).unwrap_or(false);
        record.citations = work.cited_by_count.unwrap_or(0).max(0) as u32;
        record.publication_type = work.r#type;
        record
    }
}

#[async_trait]
impl SourceAdapter for OpenAlexAdapter {
    fn id(&self) -> SourceId {
        SourceId::OpenAlex
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SourceHits, SourceError> {
        let url = self.build_search_url(query, filters, page, page_size);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search OpenAlex: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "OpenAlex API returned status: {}",
                response.status()
            )));
        }

        let data: WorksResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let records: Vec<PaperRecord> = data.results.into_iter().map(Self::parse_work).collect();

        let native = NativeFilters {
            open_access: true,
            study_type: false,
        };
        let records = residual_filter(records, filters, native);

        Ok(SourceHits {
            records,
            total: data.meta.map(|m| m.count).unwrap_or(0),
        })
    }
}

// ===== OpenAlex API types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    meta: Option<OAMeta>,
    #[serde(default)]
    results: Vec<OAWork>,
}

#[derive(Debug, Deserialize)]
struct OAMeta {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    id: Option<String>,
    display_name: Option<String>,
    doi: Option<String>,
    publication_year: Option<i32>,
    cited_by_count: Option<i64>,
    r#type: Option<String>,
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
    ids: Option<OAIds>,
    open_access: Option<OAOpenAccess>,
    primary_location: Option<OALocation>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
}

#[derive(Debug, Deserialize)]
struct OAIds {
    pmid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAOpenAccess {
    #[serde(default)]
    is_oa: bool,
}

#[derive(Debug, Deserialize)]
struct OALocation {
    source: Option<OALocationSource>,
}

#[derive(Debug, Deserialize)]
struct OALocationSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: OAAuthor,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}
