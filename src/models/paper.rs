//! Canonical paper record shared by all search backends.

use serde::{Deserialize, Serialize};

/// The backend a record (or a merged contribution) came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Semantic,
    PubMed,
    OpenAlex,
}

impl SourceId {
    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceId::Semantic => "Semantic Scholar",
            SourceId::PubMed => "PubMed",
            SourceId::OpenAlex => "OpenAlex",
        }
    }

    /// Returns the source identifier used in response payloads and logs
    pub fn id(&self) -> &'static str {
        match self {
            SourceId::Semantic => "semantic",
            SourceId::PubMed => "pubmed",
            SourceId::OpenAlex => "openalex",
        }
    }

    /// All sources queried by the aggregator, in registration order
    pub fn all() -> [SourceId; 3] {
        [SourceId::Semantic, SourceId::PubMed, SourceId::OpenAlex]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A paper in the canonical, source-agnostic shape
///
/// Adapters create these fresh per request; the deduplicator merges records
/// that resolve to the same paper. `sources` lists every backend that
/// contributed to the record and only ever grows through merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRecord {
    /// Source-native identifier (S2 paper id, PMID, OpenAlex work id)
    pub id: String,

    /// Backend that originally produced this record
    pub source: SourceId,

    /// Every backend that contributed to this record via merging
    pub sources: Vec<SourceId>,

    pub title: String,

    /// Author display names in publication order
    pub authors: Vec<String>,

    pub journal: Option<String>,

    pub year: Option<i32>,

    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Normalized DOI (lowercased, no resolver prefix)
    pub doi: Option<String>,

    pub pmid: Option<String>,

    pub url: Option<String>,

    pub open_access: bool,

    /// Never decreases across a merge
    pub citations: u32,

    pub publication_type: Option<String>,
}

impl PaperRecord {
    /// Create a record with required fields; everything else starts empty
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceId) -> Self {
        Self {
            id: id.into(),
            source,
            sources: vec![source],
            title: title.into(),
            authors: Vec::new(),
            journal: None,
            year: None,
            abstract_text: None,
            doi: None,
            pmid: None,
            url: None,
            open_access: false,
            citations: 0,
            publication_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_tracks_originating_source() {
        let record = PaperRecord::new("W123", "Test Paper", SourceId::OpenAlex);
        assert_eq!(record.source, SourceId::OpenAlex);
        assert_eq!(record.sources, vec![SourceId::OpenAlex]);
        assert_eq!(record.citations, 0);
        assert!(!record.open_access);
    }

    #[test]
    fn test_source_ids_are_stable() {
        assert_eq!(SourceId::Semantic.id(), "semantic");
        assert_eq!(SourceId::PubMed.id(), "pubmed");
        assert_eq!(SourceId::OpenAlex.id(), "openalex");
        assert_eq!(SourceId::all().len(), 3);
    }

    #[test]
    fn test_wire_shape_uses_camel_case() {
        let record = PaperRecord::new("abc", "Title", SourceId::Semantic);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("openAccess").is_some());
        assert!(json.get("publicationType").is_some());
        assert!(json.get("abstract").is_some());
    }
}
