//! Sliding-window rate limiting keyed by (category, caller identity).
//!
//! Two interchangeable backends sit behind [`RateLimitStore`]: an
//! in-process map (approximate, per-instance, self-reaping) and a sled
//! tree (exact, shareable across instances). The limiter fails open on
//! backend faults; only a genuine over-limit decision rejects a request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Outcome of one admission check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the current window rolls over
    pub reset_at: u64,
}

impl RateLimitDecision {
    /// Seconds the caller should wait before retrying, at least 1
    pub fn retry_after(&self) -> u64 {
        self.reset_at.saturating_sub(unix_now()).max(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LimiterError {
    #[error("rate limit store error: {0}")]
    Store(String),
}

/// One counting window for a key
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Window {
    count: u32,
    window_start: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn decide(window: Window, limit: u32, window_len: Duration) -> RateLimitDecision {
    RateLimitDecision {
        allowed: window.count <= limit,
        limit,
        remaining: limit.saturating_sub(window.count),
        reset_at: window.window_start + window_len.as_secs(),
    }
}

/// Keyed counter storage behind the limiter
#[async_trait]
pub trait RateLimitStore: Send + Sync + std::fmt::Debug {
    /// Record one request against `key` and report the resulting decision
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, LimiterError>;
}

/// In-process approximate backend. Per-instance counts drift under
/// horizontal scaling, which is acceptable for this tier.
#[derive(Debug, Default)]
pub struct MemoryStore {
    windows: RwLock<HashMap<String, Window>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the periodic sweep that drops expired windows
    pub fn spawn_sweeper(self: Arc<Self>, window: Duration, interval: Duration) {
        let store = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let cutoff = unix_now().saturating_sub(window.as_secs());
                let mut windows = store.windows.write().await;
                let before = windows.len();
                windows.retain(|_, w| w.window_start > cutoff);
                let swept = before - windows.len();
                if swept > 0 {
                    debug!(swept, "reaped expired rate-limit windows");
                }
            }
        });
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_len: Duration,
    ) -> Result<RateLimitDecision, LimiterError> {
        let now = unix_now();
        let mut windows = self.windows.write().await;
        let window = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if now.saturating_sub(w.window_start) >= window_len.as_secs() {
                    w.window_start = now;
                    w.count = 1;
                } else {
                    w.count = w.count.saturating_add(1);
                }
            })
            .or_insert(Window {
                count: 1,
                window_start: now,
            });
        Ok(decide(*window, limit, window_len))
    }
}

/// Exact backend on a sled tree. Pointed at shared storage it gives all
/// instances one view of the counters.
#[derive(Debug)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self, LimiterError> {
        let db = sled::open(path).map_err(|e| LimiterError::Store(e.to_string()))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl RateLimitStore for SledStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_len: Duration,
    ) -> Result<RateLimitDecision, LimiterError> {
        let now = unix_now();
        // Lost updates between the read and the write are cosmetic; the
        // window contract tolerates races.
        let current = self
            .db
            .get(key)
            .map_err(|e| LimiterError::Store(e.to_string()))?
            .and_then(|bytes| serde_json::from_slice::<Window>(&bytes).ok());

        let window = match current {
            Some(w) if now.saturating_sub(w.window_start) < window_len.as_secs() => Window {
                count: w.count.saturating_add(1),
                window_start: w.window_start,
            },
            _ => Window {
                count: 1,
                window_start: now,
            },
        };

        let bytes = serde_json::to_vec(&window).map_err(|e| LimiterError::Store(e.to_string()))?;
        self.db
            .insert(key, bytes)
            .map_err(|e| LimiterError::Store(e.to_string()))?;

        Ok(decide(window, limit, window_len))
    }
}

/// Admission control front door.
///
/// Checks the primary backend and, if that errors, falls back to the
/// in-process store; if both fail the request proceeds (fail open).
#[derive(Debug)]
pub struct RateLimiter {
    primary: Arc<dyn RateLimitStore>,
    fallback: Option<Arc<MemoryStore>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(
        primary: Arc<dyn RateLimitStore>,
        fallback: Option<Arc<MemoryStore>>,
        limit: u32,
        window: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            limit,
            window,
        }
    }

    /// Admission decision for one (category, identity) pair
    pub async fn check(&self, category: &str, identity: &str) -> RateLimitDecision {
        let key = format!("{}:{}", category, identity);

        match self.primary.hit(&key, self.limit, self.window).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(%error, "primary rate-limit store failed, falling back");
                match &self.fallback {
                    Some(fallback) => match fallback.hit(&key, self.limit, self.window).await {
                        Ok(decision) => decision,
                        Err(error) => {
                            warn!(%error, "fallback rate-limit store failed, allowing request");
                            self.open_decision()
                        }
                    },
                    None => self.open_decision(),
                }
            }
        }
    }

    fn open_decision(&self) -> RateLimitDecision {
        RateLimitDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit,
            reset_at: unix_now() + self.window.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(
            &self,
            _key: &str,
            _limit: u32,
            _window: Duration,
        ) -> Result<RateLimitDecision, LimiterError> {
            Err(LimiterError::Store("backend unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_memory_store_counts_within_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);

        for expected_remaining in [2u32, 1, 0] {
            let decision = store.hit("search:u1", 3, window).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = store.hit("search:u1", 3, window).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after() >= 1);
    }

    #[tokio::test]
    async fn test_memory_store_keys_are_independent() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        store.hit("search:u1", 1, window).await.unwrap();
        let other = store.hit("search:u2", 1, window).await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 0);
    }

    #[tokio::test]
    async fn test_sled_store_counts_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let window = Duration::from_secs(60);

        let first = assert_ok!(store.hit("search:ip", 2, window).await);
        assert!(first.allowed);
        store.hit("search:ip", 2, window).await.unwrap();
        let third = store.hit("search:ip", 2, window).await.unwrap();
        assert!(!third.allowed);
    }

    #[tokio::test]
    async fn test_limiter_fails_open_via_fallback() {
        let limiter = RateLimiter::new(
            Arc::new(BrokenStore),
            Some(Arc::new(MemoryStore::new())),
            1,
            Duration::from_secs(60),
        );

        let first = limiter.check("search", "u1").await;
        assert!(first.allowed);
        // Fallback still enforces genuine over-limit conditions.
        let second = limiter.check("search", "u1").await;
        assert!(!second.allowed);
    }

    #[tokio::test]
    async fn test_limiter_fails_open_without_fallback() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), None, 1, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("search", "u1").await.allowed);
        }
    }
}
