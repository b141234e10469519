//! Mock adapter for exercising the pipeline without a network.

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{PaperRecord, SearchFilters, SourceHits, SourceId};
use crate::sources::{SourceAdapter, SourceError};

/// A mock source that returns predefined records, fails, or stalls.
#[derive(Debug)]
pub struct MockAdapter {
    source: SourceId,
    records: Vec<PaperRecord>,
    total: usize,
    fail_with: Option<String>,
    delay: Option<Duration>,
}

impl MockAdapter {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            records: Vec::new(),
            total: 0,
            fail_with: None,
            delay: None,
        }
    }

    /// Respond with these records (total defaults to the record count)
    pub fn with_records(mut self, records: Vec<PaperRecord>) -> Self {
        self.total = records.len();
        self.records = records;
        self
    }

    /// Override the reported total estimate
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    /// Fail every search with this error message
    pub fn failing(mut self, error: impl Into<String>) -> Self {
        self.fail_with = Some(error.into());
        self
    }

    /// Sleep before responding, to trigger the aggregator timeout
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn id(&self) -> SourceId {
        self.source
    }

    async fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
        _page: usize,
        _page_size: usize,
    ) -> Result<SourceHits, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.fail_with {
            return Err(SourceError::Api(error.clone()));
        }
        Ok(SourceHits {
            records: self.records.clone(),
            total: self.total,
        })
    }
}

/// Build a record with the fields dedup cares about
pub fn make_record(
    id: &str,
    title: &str,
    source: SourceId,
    doi: Option<&str>,
    pmid: Option<&str>,
) -> PaperRecord {
    let mut record = PaperRecord::new(id, title, source);
    record.doi = doi.map(str::to_string);
    record.pmid = pmid.map(str::to_string);
    record
}
