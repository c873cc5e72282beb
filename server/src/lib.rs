pub mod cache;
pub mod config;
pub mod precache;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use cache::fetcher::Fetcher;
pub use cache::{BlobStore, CacheError, EntryStore};

use cache::strategy::CacheFirst;
use precache::PrecacheRoute;
use std::sync::Arc;

pub type AppState = Arc<CacheState>;

/// Shared state for the request handlers: the two registered routes plus
/// the passthrough fetcher for everything else
pub struct CacheState {
    /// Precached URL set, served cache-first from the "precache" cache
    pub precache: PrecacheRoute,
    /// Audio-extension route, cache-first into "audios" with expiration
    pub audio: CacheFirst,
    /// Fetcher for unmatched requests (no caching)
    pub passthrough: Arc<dyn Fetcher>,
    /// Upstream origin requests are proxied to
    pub upstream: String,
}

impl std::fmt::Debug for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheState")
            .field("upstream", &self.upstream)
            .field("audio_cache", &self.audio.cache_name())
            .field("passthrough", &"<dyn Fetcher>")
            .finish()
    }
}
