//! Cache-first strategy over a named cache
//!
//! On a hit the stored body is returned without touching the network; on a
//! miss the upstream is fetched exactly once, stored, and returned. Upstream
//! failures with no cached entry propagate to the caller.

use crate::cache::expiration::ExpirationPolicy;
use crate::cache::fetcher::{FetchedBody, Fetcher};
use crate::cache::{BlobStore, CacheEntry, CacheError, EntryStore, hash};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// The response produced by a strategy, with its cache disposition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub bytes: Vec<u8>,
    pub mime: String,
    /// True when the response came from the cache without a network fetch
    pub hit: bool,
}

/// Cache-first strategy bound to one named cache
pub struct CacheFirst {
    cache_name: String,
    entries: Arc<dyn EntryStore>,
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn Fetcher>,
    expiration: Option<ExpirationPolicy>,
}

impl CacheFirst {
    pub fn new(
        cache_name: &str,
        entries: Arc<dyn EntryStore>,
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            cache_name: cache_name.to_string(),
            entries,
            blobs,
            fetcher,
            expiration: None,
        }
    }

    /// Attach an expiration policy, run after each store into this cache
    pub fn with_expiration(mut self, policy: ExpirationPolicy) -> Self {
        self.expiration = Some(policy);
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Look up the entry for a URL in this strategy's cache
    pub async fn lookup(&self, url: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.entries.lookup(&self.cache_name, url).await
    }

    /// Serve a request cache-first
    ///
    /// `url` is the cache key (the request path); `upstream_url` is where to
    /// fetch from on a miss.
    pub async fn handle(&self, url: &str, upstream_url: &str) -> Result<CachedResponse, CacheError> {
        if let Some(entry) = self.entries.lookup(&self.cache_name, url).await? {
            match self.blobs.get(&entry.sha256).await {
                Ok(bytes) => {
                    self.entries.touch(&self.cache_name, url, Utc::now()).await?;
                    debug!("Cache hit in '{}' for {}", self.cache_name, url);
                    return Ok(CachedResponse {
                        bytes,
                        mime: entry.mime,
                        hit: true,
                    });
                }
                Err(e) => {
                    // Entry row without its blob; treat as a miss
                    warn!(
                        "Cache entry for {} has no blob ({}), refetching",
                        url, e
                    );
                }
            }
        }

        debug!("Cache miss in '{}' for {}", self.cache_name, url);
        let fetched = self.fetcher.fetch(upstream_url).await?;
        let fetched = self.store(url, fetched, None).await?;

        Ok(CachedResponse {
            bytes: fetched.bytes,
            mime: fetched.mime,
            hit: false,
        })
    }

    /// Fetch from upstream and store unconditionally
    ///
    /// Used by precache warm-up, which decides for itself (by revision)
    /// whether a refetch is needed.
    pub async fn refresh(
        &self,
        url: &str,
        upstream_url: &str,
        revision: Option<String>,
    ) -> Result<(), CacheError> {
        let fetched = self.fetcher.fetch(upstream_url).await?;
        self.store(url, fetched, revision).await?;
        Ok(())
    }

    /// Store a fetched body under `url` and run the expiration policy
    ///
    /// Returns the body back to the caller so the serving path doesn't clone it.
    async fn store(
        &self,
        url: &str,
        fetched: FetchedBody,
        revision: Option<String>,
    ) -> Result<FetchedBody, CacheError> {
        let sha256 = hash::sha256(&fetched.bytes);
        let previous = self.entries.lookup(&self.cache_name, url).await?;

        self.blobs.put(&sha256, &fetched.bytes).await?;

        let now = Utc::now();
        self.entries
            .upsert(CacheEntry {
                cache_name: self.cache_name.clone(),
                url: url.to_string(),
                sha256: sha256.clone(),
                size: fetched.bytes.len() as u64,
                mime: fetched.mime.clone(),
                revision,
                stored_at: now,
                last_used_at: now,
            })
            .await?;

        // Drop the blob the replaced entry pointed at, unless still referenced
        if let Some(prev) = previous {
            if prev.sha256 != sha256 && !self.entries.hash_in_use(&prev.sha256).await? {
                self.blobs.remove(&prev.sha256).await?;
            }
        }

        if let Some(policy) = &self.expiration {
            policy
                .enforce(self.entries.as_ref(), self.blobs.as_ref(), &self.cache_name, now)
                .await?;
        }

        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::local::LocalBlobStore;
    use crate::cache::sqlite::SqliteEntryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fetcher that counts calls and can be switched to always fail
    struct MockFetcher {
        calls: AtomicUsize,
        body: Vec<u8>,
        mime: String,
        fail: bool,
    }

    impl MockFetcher {
        fn serving(body: &[u8], mime: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                body: body.to_vec(),
                mime: mime.to_string(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                body: Vec::new(),
                mime: String::new(),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedBody, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CacheError::Upstream(format!("connection refused: {}", url)));
            }
            Ok(FetchedBody {
                bytes: self.body.clone(),
                mime: self.mime.clone(),
            })
        }
    }

    fn test_strategy(fetcher: Arc<MockFetcher>) -> (CacheFirst, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let entries: Arc<dyn EntryStore> =
            Arc::new(SqliteEntryStore::new(temp_dir.path().join("test.db")).unwrap());
        let blobs: Arc<dyn BlobStore> =
            Arc::new(LocalBlobStore::new(temp_dir.path().join("blobs")).unwrap());
        let strategy = CacheFirst::new("audios", entries, blobs, fetcher);
        (strategy, temp_dir)
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_stores() {
        let fetcher = Arc::new(MockFetcher::serving(b"mp3 bytes", "audio/mpeg"));
        let (strategy, _temp_dir) = test_strategy(fetcher.clone());

        let response = strategy
            .handle("/song.mp3", "http://origin/song.mp3")
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(!response.hit);
        assert_eq!(response.bytes, b"mp3 bytes");
        assert_eq!(response.mime, "audio/mpeg");

        let entry = strategy.lookup("/song.mp3").await.unwrap().unwrap();
        assert_eq!(entry.size, 9);
        assert_eq!(entry.mime, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_hit_serves_without_fetching() {
        let fetcher = Arc::new(MockFetcher::serving(b"mp3 bytes", "audio/mpeg"));
        let (strategy, _temp_dir) = test_strategy(fetcher.clone());

        let first = strategy
            .handle("/song.mp3", "http://origin/song.mp3")
            .await
            .unwrap();
        let second = strategy
            .handle("/song.mp3", "http://origin/song.mp3")
            .await
            .unwrap();

        // Only the miss fetched; the hit returned the stored body unchanged
        assert_eq!(fetcher.calls(), 1);
        assert!(second.hit);
        assert_eq!(second.bytes, first.bytes);
        assert_eq!(second.mime, first.mime);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates_on_miss() {
        let fetcher = Arc::new(MockFetcher::failing());
        let (strategy, _temp_dir) = test_strategy(fetcher.clone());

        let result = strategy.handle("/song.mp3", "http://origin/song.mp3").await;

        assert!(matches!(result, Err(CacheError::Upstream(_))));
        assert!(strategy.lookup("/song.mp3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_records_revision() {
        let fetcher = Arc::new(MockFetcher::serving(b"mp3 bytes", "audio/mpeg"));
        let (strategy, _temp_dir) = test_strategy(fetcher.clone());

        strategy
            .refresh("/song.mp3", "http://origin/song.mp3", Some("rev-1".to_string()))
            .await
            .unwrap();

        let entry = strategy.lookup("/song.mp3").await.unwrap().unwrap();
        assert_eq!(entry.revision, Some("rev-1".to_string()));

        // A later hit does not refetch
        let response = strategy
            .handle("/song.mp3", "http://origin/song.mp3")
            .await
            .unwrap();
        assert!(response.hit);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_expiration_runs_after_store() {
        let fetcher = Arc::new(MockFetcher::serving(b"mp3 bytes", "audio/mpeg"));
        let (strategy, _temp_dir) = test_strategy(fetcher.clone());
        let strategy = strategy.with_expiration(ExpirationPolicy::new(2, 30 * 24 * 60 * 60));

        for i in 0..3 {
            strategy
                .handle(&format!("/{}.mp3", i), &format!("http://origin/{}.mp3", i))
                .await
                .unwrap();
        }

        // Third store trimmed the cache back to the entry limit
        assert!(strategy.lookup("/2.mp3").await.unwrap().is_some());
        let remaining = [
            strategy.lookup("/0.mp3").await.unwrap().is_some(),
            strategy.lookup("/1.mp3").await.unwrap().is_some(),
            strategy.lookup("/2.mp3").await.unwrap().is_some(),
        ];
        assert_eq!(remaining.iter().filter(|kept| **kept).count(), 2);
    }
}
