//! Durable cache for assembled search responses.
//!
//! Entries live in a sled tree so they survive process restarts and can be
//! shared between instances on common storage. Reads happen before the
//! fan-out; writes are detached fire-and-forget tasks whose failures are
//! logged and never surfaced to the caller.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::models::{SearchFilters, SearchResponse, SortMode};

/// Compute the cache key for one request tuple.
///
/// Key material is the trimmed, lowercased query joined with the filters
/// (serialized with sorted keys), the sort mode and the page number; the
/// stored key is the md5 hex digest of that string.
pub fn cache_key(query: &str, filters: &SearchFilters, sort: SortMode, page: usize) -> String {
    let material = format!(
        "{}|{}|{}|{}",
        query.trim().to_lowercase(),
        filters.canonical_json(),
        sort.as_str(),
        page,
    );
    format!("{:x}", md5::compute(material.as_bytes()))
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedSearch {
    cached_at: u64,
    expires_at: u64,
    response: SearchResponse,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Search response cache backed by sled
#[derive(Debug)]
pub struct SearchCache {
    db: Option<sled::Db>,
    ttl: Duration,
}

impl SearchCache {
    /// Open the cache at `path`. An unopenable store degrades to a
    /// disabled cache with a logged warning rather than failing startup.
    pub fn open(path: &Path, ttl: Duration) -> Self {
        match sled::open(path) {
            Ok(db) => {
                debug!(path = %path.display(), "search cache opened");
                Self { db: Some(db), ttl }
            }
            Err(error) => {
                warn!(%error, path = %path.display(), "failed to open search cache, running without");
                Self { db: None, ttl }
            }
        }
    }

    /// A cache that never hits and never stores
    pub fn disabled() -> Self {
        Self {
            db: None,
            ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Look up a response; expired entries count as misses and are removed
    /// opportunistically.
    pub fn get(&self, key: &str) -> Option<SearchResponse> {
        let db = self.db.as_ref()?;
        let bytes = match db.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(error) => {
                warn!(%error, "cache read failed");
                return None;
            }
        };

        let cached: CachedSearch = match serde_json::from_slice(&bytes) {
            Ok(cached) => cached,
            Err(error) => {
                warn!(%error, "cache entry undecodable, dropping");
                let _ = db.remove(key);
                return None;
            }
        };

        if unix_now() >= cached.expires_at {
            debug!(key, "cache entry expired");
            let _ = db.remove(key);
            return None;
        }

        debug!(key, "cache hit");
        Some(cached.response)
    }

    fn put(&self, key: &str, response: &SearchResponse) -> anyhow::Result<()> {
        let db = match self.db.as_ref() {
            Some(db) => db,
            None => return Ok(()),
        };
        let now = unix_now();
        let entry = CachedSearch {
            cached_at: now,
            expires_at: now + self.ttl.as_secs(),
            response: response.clone(),
        };
        db.insert(key, serde_json::to_vec(&entry)?)?;
        Ok(())
    }

    /// Write-through as a detached background task. A slow or broken cache
    /// backend adds zero latency and zero failure probability to the
    /// response.
    pub fn store_detached(self: Arc<Self>, key: String, response: SearchResponse) {
        if self.db.is_none() {
            return;
        }
        let cache = self;
        tokio::spawn(async move {
            if let Err(error) = cache.put(&key, &response) {
                warn!(%error, key, "cache write failed");
            } else {
                debug!(key, "cached search response");
            }
        });
    }
}
