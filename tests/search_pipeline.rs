//! End-to-end pipeline tests over in-process mock sources.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use paper_search::cache::SearchCache;
use paper_search::limiter::{MemoryStore, RateLimiter};
use paper_search::models::{
    PaperRecord, SearchFilters, SearchRequest, SortMode, SourceHits, SourceId,
};
use paper_search::search::SearchService;
use paper_search::sources::mock::{make_record, MockAdapter};
use paper_search::sources::{SourceAdapter, SourceError};

fn request(query: &str, page: usize, sort: SortMode) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        filters: SearchFilters::default(),
        sort,
        page,
    }
}

fn service_with(
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cache: Arc<SearchCache>,
) -> SearchService {
    SearchService::new(adapters, cache, 20, Duration::from_millis(500))
}

#[tokio::test]
async fn partial_failure_keeps_surviving_sources() {
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(
            MockAdapter::new(SourceId::Semantic).with_records(vec![make_record(
                "s1",
                "Deep Learning Approaches To Protein Folding",
                SourceId::Semantic,
                Some("10.1/dl"),
                None,
            )]),
        ),
        // Slow enough to trip the 500ms aggregator timeout.
        Arc::new(
            MockAdapter::new(SourceId::PubMed)
                .with_delay(Duration::from_secs(5))
                .with_records(vec![]),
        ),
        Arc::new(
            MockAdapter::new(SourceId::OpenAlex).with_records(vec![make_record(
                "o1",
                "An Unrelated OpenAlex Work",
                SourceId::OpenAlex,
                None,
                None,
            )]),
        ),
    ];

    let svc = service_with(adapters, Arc::new(SearchCache::disabled()));
    let response = svc.search(&request("protein", 1, SortMode::Relevance)).await;

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.sources.len(), 3);
    assert!(!response.sources["pubmed"].success);
    assert!(response.sources["pubmed"]
        .error
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert!(response.sources["semantic"].success);
    assert!(response.sources["openalex"].success);
}

#[tokio::test]
async fn doi_variants_merge_to_one_record() {
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(
            MockAdapter::new(SourceId::Semantic).with_records(vec![make_record(
                "s1",
                "The State Of Open Access",
                SourceId::Semantic,
                Some("https://doi.org/10.1234/ABC"),
                None,
            )]),
        ),
        Arc::new(
            MockAdapter::new(SourceId::OpenAlex).with_records(vec![make_record(
                "o1",
                "The state of open access",
                SourceId::OpenAlex,
                Some("10.1234/abc"),
                None,
            )]),
        ),
    ];

    let svc = service_with(adapters, Arc::new(SearchCache::disabled()));
    let response = svc.search(&request("open access", 1, SortMode::Relevance)).await;

    assert_eq!(response.results.len(), 1);
    let record = &response.results[0];
    assert_eq!(record.sources.len(), 2);
    assert!(record.sources.contains(&SourceId::Semantic));
    assert!(record.sources.contains(&SourceId::OpenAlex));
}

#[tokio::test]
async fn cache_round_trip_flips_cached_flag() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SearchCache::open(dir.path(), Duration::from_secs(60)));

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(
        MockAdapter::new(SourceId::Semantic)
            .with_records(vec![make_record(
                "s1",
                "A Cacheable Result Set",
                SourceId::Semantic,
                None,
                None,
            )])
            .with_total(1),
    )];

    let svc = service_with(adapters, cache.clone());
    let req = request("cacheable", 1, SortMode::Relevance);

    let first = svc.search(&req).await;
    assert!(!first.cached);

    // The write-through is detached; wait for it to land.
    let mut second = svc.search(&req).await;
    for _ in 0..50 {
        if second.cached {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        second = svc.search(&req).await;
    }
    assert!(second.cached);

    // Identical payload apart from the cached flag.
    assert_eq!(first.total_results, second.total_results);
    assert_eq!(first.total_pages, second.total_pages);
    assert_eq!(first.results.len(), second.results.len());
    assert_eq!(first.results[0].id, second.results[0].id);
    assert_eq!(first.sources, second.sources);
}

/// Adapter that serves a distinct window of a fixed corpus per page
#[derive(Debug)]
struct PagedAdapter {
    source: SourceId,
    corpus: Vec<PaperRecord>,
}

#[async_trait]
impl SourceAdapter for PagedAdapter {
    fn id(&self) -> SourceId {
        self.source
    }

    async fn search(
        &self,
        _query: &str,
        _filters: &SearchFilters,
        page: usize,
        page_size: usize,
    ) -> Result<SourceHits, SourceError> {
        let start = (page.saturating_sub(1) * page_size).min(self.corpus.len());
        let end = (start + page_size).min(self.corpus.len());
        Ok(SourceHits {
            records: self.corpus[start..end].to_vec(),
            total: self.corpus.len(),
        })
    }
}

#[tokio::test]
async fn pages_of_a_stable_query_do_not_overlap() {
    let corpus: Vec<PaperRecord> = (0..50)
        .map(|i| {
            make_record(
                &format!("w{}", i),
                &format!("Distinct Work Number {} With A Long Title", i),
                SourceId::OpenAlex,
                Some(&format!("10.9/w{}", i)),
                None,
            )
        })
        .collect();

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(PagedAdapter {
        source: SourceId::OpenAlex,
        corpus,
    })];

    let svc = service_with(adapters, Arc::new(SearchCache::disabled()));
    let page1 = svc.search(&request("works", 1, SortMode::Relevance)).await;
    let page2 = svc.search(&request("works", 2, SortMode::Relevance)).await;

    assert!(!page1.results.is_empty());
    assert!(!page2.results.is_empty());
    for record in &page2.results {
        assert!(
            !page1.results.iter().any(|r| r.id == record.id),
            "record {} appeared on both pages",
            record.id
        );
    }
    assert_eq!(page1.total_results, 50);
    assert_eq!(page1.total_pages, 3);
}

#[tokio::test]
async fn sort_modes_reorder_merged_results() {
    let mut old_heavily_cited = make_record(
        "s1",
        "An Old Heavily Cited Classic Paper",
        SourceId::Semantic,
        None,
        None,
    );
    old_heavily_cited.year = Some(1998);
    old_heavily_cited.citations = 9000;
    let mut recent = make_record(
        "s2",
        "A Recent Lightly Cited Paper",
        SourceId::Semantic,
        None,
        None,
    );
    recent.year = Some(2024);
    recent.citations = 3;

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(
        MockAdapter::new(SourceId::Semantic).with_records(vec![old_heavily_cited, recent]),
    )];
    let svc = service_with(adapters, Arc::new(SearchCache::disabled()));

    let newest = svc.search(&request("papers", 1, SortMode::Newest)).await;
    assert_eq!(newest.results[0].id, "s2");

    let citations = svc.search(&request("papers", 1, SortMode::Citations)).await;
    assert_eq!(citations.results[0].id, "s1");
}

#[tokio::test]
async fn limit_plus_one_is_rejected_with_retry_hint() {
    let limiter = RateLimiter::new(
        Arc::new(MemoryStore::new()),
        None,
        3,
        Duration::from_secs(60),
    );

    for _ in 0..3 {
        assert!(limiter.check("search", "user-1").await.allowed);
    }
    let rejected = limiter.check("search", "user-1").await;
    assert!(!rejected.allowed);
    assert!(rejected.retry_after() > 0);

    // A different identity in the same category is unaffected.
    assert!(limiter.check("search", "user-2").await.allowed);
}
