//! Semantic Scholar source adapter.
//!
//! Uses the Graph API (`/graph/v1/paper/search`). Year range and
//! open-access filters are pushed down; study type is post-filtered.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PaperRecord, SearchFilters, SourceHits, SourceId};
use crate::normalize::normalize_doi;
use crate::sources::{http_client, residual_filter, NativeFilters, SourceAdapter, SourceError};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

const SEARCH_FIELDS: &str =
    "title,abstract,year,citationCount,externalIds,url,openAccessPdf,venue,publicationTypes,authors";

/// Semantic Scholar research source
#[derive(Debug, Clone)]
pub struct SemanticScholarAdapter {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key,
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
        let offset = page.saturating_sub(1) * page_size;
        let mut url = format!(
            "{}/paper/search?query={}&limit={}&offset={}&fields={}",
            self.base_url,
            urlencoding::encode(query),
            page_size,
            offset,
            SEARCH_FIELDS,
        );

        match (filters.year_from, filters.year_to) {
            (Some(from), Some(to)) => url.push_str(&format!("&year={}-{}", from, to)),
            (Some(from), None) => url.push_str(&format!("&year={}-", from)),
            (None, Some(to)) => url.push_str(&format!("&year=-{}", to)),
            (None, None) => {}
        }

        if filters.open_access_only {
            url.push_str("&openAccessPdf");
        }

        url
    }

    fn parse_paper(data: S2Paper) -> PaperRecord {
        let doi = data
            .external_ids
            .as_ref()
            .and_then(|ids| ids.doi.as_deref())
            .map(normalize_doi)
            .filter(|d| !d.is_empty());
        let pmid = data
            .external_ids
            .as_ref()
            .and_then(|ids| ids.pub_med.clone())
            .filter(|p| !p.is_empty());

        let mut record = PaperRecord::new(
            data.paper_id.unwrap_or_default(),
            data.title.unwrap_or_default(),
            SourceId::Semantic,
        );
        record.authors = data
            .authors
            .into_iter()
            .filter_map(|a| a.name)
            .collect();
        record.journal = data.venue.filter(|v| !v.is_empty());
        record.year = data.year;
        record.abstract_text = data.r#abstract.filter(|a| !a.is_empty());
        record.url = data.url;
        record.open_access = data.open_access_pdf.and_then(|p| p.url).is_some();
        record.citations = data.citation_count.unwrap_or(0).max(0) as u32;
        record.publication_type = data
            .publication_types
            .unwrap_or_default()
            .into_iter()
            .next();
        record.doi = doi;
        record.pmid = pmid;
        record
    }
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn id(&self) -> SourceId {
        SourceId::Semantic
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SourceHits, SourceError> {
        let url = self.build_search_url(query, filters, page, page_size);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            SourceError::Network(format!("Failed to search Semantic Scholar: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Semantic Scholar API returned status: {}",
                response.status()
            )));
        }

        let data: S2SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let records: Vec<PaperRecord> = data
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Self::parse_paper)
            .collect();

        let native = NativeFilters {
            open_access: true,
            study_type: false,
        };
        let records = residual_filter(records, filters, native);

        Ok(SourceHits {
            records,
            total: data.total.unwrap_or(0),
        })
    }
}

// ===== Semantic Scholar API types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<usize>,
    data: Option<Vec<S2Paper>>,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    r#abstract: Option<String>,
    year: Option<i32>,
    #[serde(rename = "citationCount")]
    citation_count: Option<i64>,
    venue: Option<String>,
    url: Option<String>,
    #[serde(rename = "publicationTypes")]
    publication_types: Option<Vec<String>>,
    #[serde(rename = "externalIds")]
    external_ids: Option<S2ExternalIds>,
    #[serde(rename = "openAccessPdf")]
    open_access_pdf: Option<S2OpenAccessPdf>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "PubMed")]
    pub_med: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "total": 120,
        "data": [{
            "paperId": "s2-1",
            "title": "Deep Learning",
            "abstract": "An overview.",
            "year": 2015,
            "citationCount": 42000,
            "venue": "Nature",
            "url": "https://www.semanticscholar.org/paper/s2-1",
            "publicationTypes": ["Review", "JournalArticle"],
            "externalIds": {"DOI": "https://doi.org/10.1038/NATURE14539", "PubMed": "26017442"},
            "openAccessPdf": {"url": "https://example.org/p.pdf"},
            "authors": [{"name": "Y. LeCun"}, {"name": "Y. Bengio"}]
        }]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let parsed: S2SearchResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(parsed.total, Some(120));
        let record = SemanticScholarAdapter::parse_paper(parsed.data.unwrap().remove(0));
        assert_eq!(record.id, "s2-1");
        assert_eq!(record.doi.as_deref(), Some("10.1038/nature14539"));
        assert_eq!(record.pmid.as_deref(), Some("26017442"));
        assert_eq!(record.authors, vec!["Y. LeCun", "Y. Bengio"]);
        assert_eq!(record.year, Some(2015));
        assert_eq!(record.citations, 42000);
        assert!(record.open_access);
        assert_eq!(record.publication_type.as_deref(), Some("Review"));
    }

    #[test]
    fn test_build_search_url() {
        let adapter = SemanticScholarAdapter::new(None);
        let filters = SearchFilters {
            year_from: Some(2018),
            year_to: Some(2022),
            open_access_only: true,
            ..Default::default()
        };
        let url = adapter.build_search_url("machine learning", &filters, 2, 20);
        assert!(url.contains("query=machine%20learning"));
        assert!(url.contains("limit=20"));
        assert!(url.contains("offset=20"));
        assert!(url.contains("year=2018-2022"));
        assert!(url.contains("openAccessPdf"));
    }

    #[test]
    fn test_build_search_url_open_year_range() {
        let adapter = SemanticScholarAdapter::new(None);
        let filters = SearchFilters {
            year_from: Some(2020),
            ..Default::default()
        };
        let url = adapter.build_search_url("cancer", &filters, 1, 10);
        assert!(url.contains("year=2020-"));
        assert!(url.contains("offset=0"));
    }

    #[tokio::test]
    async fn test_search_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SAMPLE)
            .create_async()
            .await;

        let adapter = SemanticScholarAdapter::new(None).with_base_url(server.url());
        let hits = adapter
            .search("deep learning", &SearchFilters::default(), 1, 20)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(hits.total, 120);
        assert_eq!(hits.records.len(), 1);
        assert_eq!(hits.records[0].title, "Deep Learning");
    }

    #[tokio::test]
    async fn test_search_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper/search")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let adapter = SemanticScholarAdapter::new(None).with_base_url(server.url());
        let err = adapter
            .search("deep learning", &SearchFilters::default(), 1, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Api(_)));
    }
}
