//! Core data structures for the federated search pipeline.

mod paper;
mod search;

pub use paper::{PaperRecord, SourceId};
pub use search::{
    SearchFilters, SearchRequest, SearchResponse, SortMode, SourceHits, SourceResult, SourceStatus,
    MIN_QUERY_LEN,
};
