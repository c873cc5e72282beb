//! HTTP surface: request interception and dispatch
//!
//! Two routes are registered against incoming requests: the precached URL
//! set and the audio-extension pattern, both served cache-first. Everything
//! else is proxied to the upstream origin without caching.

use crate::AppState;
use crate::cache::CacheError;
use crate::cache::strategy::CachedResponse;
use crate::routes::is_audio_path;
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/{*path}", get(handle_request))
        .layer(CorsLayer::permissive()) // Cached audio is fetched cross-origin by pages
        .with_state(state)
}

async fn handle_request(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let path = format!("/{}", path);
    let upstream_url = format!("{}{}", state.upstream, path);

    if state.precache.matches(&path) {
        debug!("Precache route matched for {}", path);
        return cached_response(state.precache.strategy().handle(&path, &upstream_url).await, &path);
    }

    if is_audio_path(&path) {
        debug!("Audio route matched for {}", path);
        return cached_response(state.audio.handle(&path, &upstream_url).await, &path);
    }

    // Default route: proxy to upstream, no caching
    match state.passthrough.fetch(&upstream_url).await {
        Ok(body) => body_response(body.bytes, &body.mime),
        Err(e) => upstream_error(&path, e),
    }
}

fn cached_response(result: Result<CachedResponse, CacheError>, path: &str) -> Response {
    match result {
        Ok(cached) => body_response(cached.bytes, &cached.mime),
        Err(e) => upstream_error(path, e),
    }
}

fn body_response(bytes: Vec<u8>, mime: &str) -> Response {
    ([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response()
}

fn upstream_error(path: &str, e: CacheError) -> Response {
    warn!("Request for {} failed: {}", path, e);
    (
        StatusCode::BAD_GATEWAY,
        format!("Failed to fetch {}: {}", path, e),
    )
        .into_response()
}
