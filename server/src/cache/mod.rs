//! Named-cache storage and caching strategies
//!
//! This module provides the storage layer for the audio cache server:
//! metadata rows for cache entries (keyed by cache name + URL) and a
//! content-addressable blob store for response bodies, plus the
//! cache-first strategy and expiration policy built on top of them.

pub mod expiration;
pub mod fetcher;
pub mod hash;
pub mod local;
pub mod sqlite;
pub mod strategy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream fetch failed: {0}")]
    Upstream(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// One precacheable file from the build-time manifest
///
/// The revision token is opaque; it only has to change when the file's
/// content changes so the warm-up pass knows to refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Content-revision token generated at build time
    pub revision: String,
    /// The asset URL path (e.g. "/assets/ehhh.mp3")
    pub url: String,
}

/// Metadata for one entry in a named cache
///
/// The body bytes live in the blob store under `sha256`; this row is what
/// the expiration policy reasons about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The named cache this entry belongs to (e.g. "audios")
    pub cache_name: String,
    /// The request URL path this entry answers
    pub url: String,
    /// SHA-256 of the stored body (blob store key)
    pub sha256: String,
    /// Body size in bytes
    pub size: u64,
    /// MIME type reported by the upstream response
    pub mime: String,
    /// Revision token, set only for precached entries
    pub revision: Option<String>,
    /// When the body was stored; age-based eviction counts from here
    pub stored_at: DateTime<Utc>,
    /// Last time the entry answered a request
    pub last_used_at: DateTime<Utc>,
}

/// Trait for managing cache entry metadata
///
/// This abstraction allows for different storage backends (SQLite, Postgres, etc.)
/// while keeping the caching strategies and the expiration policy backend-agnostic.
#[async_trait::async_trait]
pub trait EntryStore: Send + Sync {
    /// Look up the entry for a URL in a named cache
    async fn lookup(&self, cache_name: &str, url: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or replace the entry for `(cache_name, url)`
    async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Record that an entry answered a request at `when`
    async fn touch(&self, cache_name: &str, url: &str, when: DateTime<Utc>)
    -> Result<(), CacheError>;

    /// Number of entries currently in a named cache
    async fn count(&self, cache_name: &str) -> Result<u64, CacheError>;

    /// Delete entries stored at or before `cutoff`
    ///
    /// Returns the SHA-256 hashes of the deleted rows so the caller can
    /// garbage-collect unreferenced blobs.
    async fn purge_stored_before(
        &self,
        cache_name: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, CacheError>;

    /// Delete the oldest entries (by `stored_at`) until at most `max` remain
    ///
    /// Returns the SHA-256 hashes of the deleted rows.
    async fn trim_oldest(&self, cache_name: &str, max: u64) -> Result<Vec<String>, CacheError>;

    /// Whether any entry, in any named cache, still references this hash
    async fn hash_in_use(&self, sha256: &str) -> Result<bool, CacheError>;
}

/// Trait for physical storage of cached body bytes
///
/// Bodies are content-addressed by SHA-256, so identical responses cached
/// under different URLs share one blob.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store body bytes under their hash
    ///
    /// This operation should be atomic: either the blob is fully stored or not at all.
    async fn put(&self, hash: &str, data: &[u8]) -> Result<(), CacheError>;

    /// Check if a blob exists in the store
    async fn exists(&self, hash: &str) -> Result<bool, CacheError>;

    /// Read blob bytes from the store
    async fn get(&self, hash: &str) -> Result<Vec<u8>, CacheError>;

    /// Remove a blob; removing a missing blob is not an error
    async fn remove(&self, hash: &str) -> Result<(), CacheError>;
}
