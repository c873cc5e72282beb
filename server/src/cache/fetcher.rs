//! Upstream HTTP fetcher used on cache misses and passthrough requests

use crate::cache::CacheError;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// A fetched upstream response body with its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Trait for fetching a URL into memory
///
/// The caching strategies only need this one operation; keeping it behind a
/// trait lets tests count and fail fetches deterministically.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBody, CacheError>;
}

/// reqwest-backed fetcher with a fixed timeout and redirect limit
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher
    ///
    /// A User-Agent can be supplied to avoid bot detection on some origins.
    pub fn new(user_agent: Option<&str>) -> Result<Self, CacheError> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(ua) = user_agent {
            client_builder = client_builder.user_agent(ua);
        }

        let client = client_builder
            .build()
            .map_err(|e| CacheError::Storage(Box::new(e)))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBody, CacheError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CacheError::Upstream(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        // MIME type from the response, parameters stripped
        let mime = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("application/octet-stream")
            .split(';')
            .next()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CacheError::Upstream(e.to_string()))?
            .to_vec();

        debug!("Fetched {} bytes from {}", bytes.len(), url);

        Ok(FetchedBody { bytes, mime })
    }
}
