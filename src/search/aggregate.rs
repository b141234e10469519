//! Concurrent fan-out of one query to every source adapter.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::models::{SearchFilters, SourceResult};
use crate::sources::SourceAdapter;

/// Dispatch the query to all adapters concurrently and wait for every
/// outcome.
///
/// Each call runs under its own timeout; expiry cancels the in-flight
/// request. A failed or timed-out source degrades to a failed
/// [`SourceResult`] instead of aborting the request, so the returned vec
/// always has one entry per adapter, in registration order.
pub async fn fan_out(
    adapters: &[Arc<dyn SourceAdapter>],
    query: &str,
    filters: &SearchFilters,
    page: usize,
    page_size: usize,
    timeout: Duration,
) -> Vec<SourceResult> {
    let calls = adapters.iter().map(|adapter| {
        let adapter = Arc::clone(adapter);
        async move {
            match tokio::time::timeout(timeout, adapter.search(query, filters, page, page_size))
                .await
            {
                Ok(Ok(hits)) => SourceResult::ok(adapter.id(), hits),
                Ok(Err(error)) => {
                    warn!(source = %adapter.id(), %error, "source search failed");
                    SourceResult::failed(adapter.id(), error.to_string())
                }
                Err(_) => {
                    warn!(source = %adapter.id(), timeout_secs = timeout.as_secs(), "source search timed out");
                    SourceResult::failed(
                        adapter.id(),
                        format!("timed out after {}s", timeout.as_secs()),
                    )
                }
            }
        }
    });

    join_all(calls).await
}
