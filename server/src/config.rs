//! Environment configuration and runtime module URL resolution

use crate::cache::CacheError;
use std::env;
use std::path::PathBuf;

/// Named cache for runtime-cached audio responses
pub const AUDIO_CACHE_NAME: &str = "audios";

/// Entry limit for the "audios" cache
pub const MAX_AUDIO_ENTRIES: u64 = 120;

/// Age limit for the "audios" cache: 30 days
pub const MAX_AUDIO_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Pinned version of the remote runtime modules
pub const RUNTIME_MODULE_VERSION: &str = "5.1.3";

/// Server configuration read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root directory holding the entry database and blob store
    pub storage_dir: PathBuf,
    /// Upstream origin requests are proxied to (scheme + host + port)
    pub upstream: String,
    /// Path to the build-generated precache manifest
    pub manifest_path: PathBuf,
    /// Listen address
    pub bind_addr: String,
}

impl ServerConfig {
    /// Read configuration from `AUDIOCACHE_*` environment variables,
    /// falling back to development defaults
    pub fn from_env() -> Result<Self, CacheError> {
        let storage_dir = env::var("AUDIOCACHE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./audiocache-storage"));

        let upstream = env::var("AUDIOCACHE_UPSTREAM")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let upstream = normalize_origin(&upstream)?;

        let manifest_path = env::var("AUDIOCACHE_MANIFEST")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./precache-manifest.json"));

        let bind_addr =
            env::var("AUDIOCACHE_BIND").unwrap_or_else(|_| "127.0.0.1:8730".to_string());

        Ok(Self {
            storage_dir,
            upstream,
            manifest_path,
            bind_addr,
        })
    }
}

/// Normalize an upstream URL to its origin: scheme + host + optional port,
/// no path and no trailing slash
fn normalize_origin(raw: &str) -> Result<String, CacheError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| CacheError::InvalidUrl(format!("Failed to parse upstream URL: {}", e)))?;

    let scheme = parsed.scheme();
    let host = parsed
        .host_str()
        .ok_or_else(|| CacheError::InvalidUrl(format!("Upstream URL has no host: {}", raw)))?;

    Ok(if let Some(port) = parsed.port() {
        format!("{}://{}:{}", scheme, host, port)
    } else {
        format!("{}://{}", scheme, host)
    })
}

/// Resolve a logical runtime module name to its versioned download URL
///
/// Pure string construction: `.../<name>@<version>/build/<name>.<env>.js`
/// with `env` being "dev" when `debug` is set, "prod" otherwise.
pub fn runtime_module_url(name: &str, debug: bool) -> String {
    let env = if debug { "dev" } else { "prod" };
    format!(
        "https://cdn.jsdelivr.net/npm/{}@{}/build/{}.{}.js",
        name, RUNTIME_MODULE_VERSION, name, env
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_module_url_prod() {
        assert_eq!(
            runtime_module_url("workbox-routing", false),
            "https://cdn.jsdelivr.net/npm/workbox-routing@5.1.3/build/workbox-routing.prod.js"
        );
    }

    #[test]
    fn test_runtime_module_url_dev() {
        assert_eq!(
            runtime_module_url("workbox-core", true),
            "https://cdn.jsdelivr.net/npm/workbox-core@5.1.3/build/workbox-core.dev.js"
        );
    }

    #[test]
    fn test_normalize_origin_strips_path() {
        assert_eq!(
            normalize_origin("https://cdn.example.com/some/path").unwrap(),
            "https://cdn.example.com"
        );
    }

    #[test]
    fn test_normalize_origin_keeps_port() {
        assert_eq!(
            normalize_origin("http://127.0.0.1:8080/").unwrap(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_normalize_origin_rejects_garbage() {
        assert!(normalize_origin("not a url").is_err());
    }
}
