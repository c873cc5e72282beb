//! Precache manifest loading, selection and warm-up
//!
//! The build step emits a manifest of `{revision, url}` descriptors. At
//! startup the manifest is filtered down to a fixed initial URL set, the
//! selected assets are fetched into the "precache" cache, and their URLs
//! become a route that is served cache-first (falling through to the
//! network on a miss).

use crate::cache::strategy::CacheFirst;
use crate::cache::{AssetDescriptor, CacheError};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Named cache holding the precached assets
pub const PRECACHE_NAME: &str = "precache";

/// The subset of the manifest warmed eagerly at startup
pub const INITIAL_PRECACHE_URLS: [&str; 3] = [
    "/assets/ehhh.mp3",
    "/assets/ehhh2.mp3",
    "/assets/ehhh3.mp3",
];

/// Load the precache manifest from a JSON file
///
/// A missing manifest is not an error: the precache set is simply empty.
pub fn load_manifest(path: &Path) -> Result<Vec<AssetDescriptor>, CacheError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Precache manifest not found at {:?}, using empty manifest", path);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let manifest: Vec<AssetDescriptor> = serde_json::from_slice(&bytes)?;
    info!(
        "Loaded precache manifest with {} entries from {:?}",
        manifest.len(),
        path
    );
    Ok(manifest)
}

/// Filter the manifest down to the descriptors whose URL is in
/// `initial_urls`, preserving manifest order
pub fn select_precache(
    manifest: &[AssetDescriptor],
    initial_urls: &[&str],
) -> Vec<AssetDescriptor> {
    let wanted: HashSet<&str> = initial_urls.iter().copied().collect();
    manifest
        .iter()
        .filter(|descriptor| wanted.contains(descriptor.url.as_str()))
        .cloned()
        .collect()
}

/// The precache route: a fixed URL set served cache-first
pub struct PrecacheRoute {
    strategy: CacheFirst,
    urls: HashSet<String>,
}

impl PrecacheRoute {
    pub fn new(strategy: CacheFirst, selected: &[AssetDescriptor]) -> Self {
        Self {
            strategy,
            urls: selected.iter().map(|d| d.url.clone()).collect(),
        }
    }

    /// Whether a request path belongs to the precached set
    pub fn matches(&self, path: &str) -> bool {
        self.urls.contains(path)
    }

    pub fn strategy(&self) -> &CacheFirst {
        &self.strategy
    }

    /// Warm the precache from the selected descriptors
    ///
    /// Entries already cached under the same revision are skipped. A fetch
    /// failure for one asset is logged and does not abort the warm-up, so
    /// the server always comes up; missed assets are fetched on first
    /// request instead. Returns the number of assets fetched.
    pub async fn warm(
        &self,
        selected: &[AssetDescriptor],
        upstream: &str,
    ) -> Result<usize, CacheError> {
        let mut warmed = 0;

        for descriptor in selected {
            if let Some(entry) = self.strategy.lookup(&descriptor.url).await? {
                if entry.revision.as_deref() == Some(descriptor.revision.as_str()) {
                    debug!("Precache entry up to date: {}", descriptor.url);
                    continue;
                }
            }

            let upstream_url = format!("{}{}", upstream, descriptor.url);
            match self
                .strategy
                .refresh(&descriptor.url, &upstream_url, Some(descriptor.revision.clone()))
                .await
            {
                Ok(()) => {
                    info!("Precached {} (revision {})", descriptor.url, descriptor.revision);
                    warmed += 1;
                }
                Err(e) => {
                    warn!("Failed to precache {}: {}", descriptor.url, e);
                }
            }
        }

        Ok(warmed)
    }
}
