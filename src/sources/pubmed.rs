//! PubMed source adapter using the NCBI E-utilities API.
//!
//! Search is two-phase: `esearch.fcgi` returns the PMIDs for the requested
//! page, `efetch.fcgi` returns full article XML for those PMIDs. Date
//! range, study type and human-only filters are expressed in the search
//! term; open access is post-filtered.

use async_trait::async_trait;
use quick_xml::de::from_str;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PaperRecord, SearchFilters, SourceHits, SourceId};
use crate::normalize::{extract_year, normalize_doi};
use crate::sources::{http_client, residual_filter, NativeFilters, SourceAdapter, SourceError};

const EUTILS_API_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed research source
#[derive(Debug, Clone)]
pub struct PubMedAdapter {
    client: Arc<Client>,
    base_url: String,
}

impl PubMedAdapter {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            base_url: EUTILS_API_BASE.to_string(),
        }
    }

    /// Point the adapter at a different host (for tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the esearch term, folding in the filters PubMed understands
    fn build_term(query: &str, filters: &SearchFilters) -> String {
        let mut term = format!("({})", query);
        if let Some(study_type) = &filters.study_type {
            term.push_str(&format!(" AND {}[pt]", study_type));
        }
        if filters.human_only {
            term.push_str(" AND humans[mh]");
        }
        term
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
            "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retstart={}&retmode=json",
            self.base_url,
            urlencoding::encode(&Self::build_term(query, filters)),
            page_size,
            offset,
        );

        if filters.year_from.is_some() || filters.year_to.is_some() {
            let from = filters.year_from.unwrap_or(1800);
            let to = filters.year_to.unwrap_or(3000);
            url.push_str(&format!(
                "&datetype=pdat&mindate={}/01/01&maxdate={}/12/31",
                from, to
            ));
        }

        url
    }

    fn build_fetch_url(&self, pmids: &[String]) -> String {
        format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml",
            self.base_url,
            pmids.join(","),
        )
    }

    /// Parse the efetch article XML into canonical records
    fn parse_fetch_response(xml: &str) -> Result<Vec<PaperRecord>, SourceError> {
        let result: PubmedArticleSet = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed fetch XML: {}", e)))?;

        let mut records = Vec::new();

        for article in result.articles {
            let citation = match article.citation {
                Some(c) => c,
                None => continue,
            };
            let pmid = citation.pmid.map(|p| p.value).unwrap_or_default();
            let art = match citation.article {
                Some(a) => a,
                None => continue,
            };

            let title = art.title.map(|t| t.value).unwrap_or_default();

            let authors = art
                .author_list
                .map(|al| {
                    al.authors
                        .into_iter()
                        .filter_map(|author| {
                            if let Some(collective) = author.collective_name {
                                return Some(collective.value);
                            }
                            let last = author.last_name.map(|l| l.value)?;
                            match author.fore_name.map(|f| f.value) {
                                Some(fore) => Some(format!("{} {}", fore, last)),
                                None => Some(last),
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            // Labelled abstract sections keep their label so structured
            // abstracts stay readable as one string.
            let abstract_text = art.r#abstract.map(|ab| {
                ab.sections
                    .into_iter()
                    .map(|section| match section.label {
                        Some(label) => format!("{}: {}", label, section.text),
                        None => section.text,
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            });

            let journal = art
                .journal
                .as_ref()
                .and_then(|j| j.title.as_ref())
                .map(|t| t.value.clone());

            let year = art
                .journal
                .as_ref()
                .and_then(|j| j.issue.as_ref())
                .and_then(|ji| ji.pub_date.as_ref())
                .and_then(|pd| {
                    pd.year
                        .as_ref()
                        .map(|y| y.value.clone())
                        .or_else(|| pd.medline_date.as_ref().map(|m| m.value.clone()))
                })
                .and_then(|date| extract_year(&date));

            let publication_type = art
                .publication_type_list
                .and_then(|pl| pl.types.into_iter().next())
                .map(|t| t.value);

            let doi = article
                .pubmed_data
                .and_then(|pd| pd.article_id_list)
                .and_then(|ail| {
                    ail.ids
                        .into_iter()
                        .find(|id| id.id_type == "doi")
                        .map(|id| normalize_doi(&id.value))
                })
                .filter(|d| !d.is_empty());

            let mut record = PaperRecord::new(pmid.clone(), title, SourceId::PubMed);
            if !pmid.is_empty() {
                record.url = Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid));
                record.pmid = Some(pmid);
            }
            record.authors = authors;
            record.abstract_text = abstract_text.filter(|a| !a.is_empty());
            record.journal = journal;
            record.year = year;
            record.publication_type = publication_type;
            record.doi = doi;
            records.push(record);
        }

        Ok(records)
    }
}

impl Default for PubMedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for PubMedAdapter {
    fn id(&self) -> SourceId {
        SourceId::PubMed
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SourceHits, SourceError> {
        // Phase one: resolve the query to the page's PMIDs.
        let search_url = self.build_search_url(query, filters, page, page_size);
        let response = self
            .client
            .get(&search_url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to search PubMed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "PubMed esearch returned status: {}",
                response.status()
            )));
        }

        let search: ESearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse esearch JSON: {}", e)))?;

        let total = search
            .result
            .count
            .parse::<usize>()
            .unwrap_or(search.result.id_list.len());
        let pmids = search.result.id_list;

        if pmids.is_empty() {
            return Ok(SourceHits {
                records: Vec::new(),
                total,
            });
        }

        // Phase two: fetch article metadata and text for those PMIDs.
        let fetch_url = self.build_fetch_url(&pmids);
        let response = self
            .client
            .get(&fetch_url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to fetch PubMed details: {}", e)))?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "PubMed efetch returned status: {}",
                response.status()
            )));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read efetch response: {}", e)))?;

        let records = Self::parse_fetch_response(&xml)?;
        let records = residual_filter(
            records,
            filters,
            NativeFilters {
                open_access: false,
                study_type: true,
            },
        );

        Ok(SourceHits { records, total })
    }
}

// ===== E-utilities response types =====

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    #[serde(rename = "esearchresult")]
    result: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: String,
    #[serde(rename = "idlist", default)]
    id_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation")]
    citation: Option<MedlineCitation>,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: Option<TextNode>,
    #[serde(rename = "Article")]
    article: Option<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
    #[serde(rename = "ArticleTitle")]
    title: Option<TextNode>,
    #[serde(rename = "Abstract")]
    r#abstract: Option<Abstract>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
    #[serde(rename = "PublicationTypeList")]
    publication_type_list: Option<PublicationTypeList>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<TextNode>,
    #[serde(rename = "JournalIssue")]
    issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<TextNode>,
    #[serde(rename = "MedlineDate")]
    medline_date: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<AbstractSection>,
}

#[derive(Debug, Deserialize)]
struct AbstractSection {
    #[serde(rename = "@Label")]
    label: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "LastName")]
    last_name: Option<TextNode>,
    #[serde(rename = "ForeName")]
    fore_name: Option<TextNode>,
    #[serde(rename = "CollectiveName")]
    collective_name: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct PublicationTypeList {
    #[serde(rename = "PublicationType", default)]
    types: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    article_id_list: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}
