use audiocache_server::cache::expiration::ExpirationPolicy;
use audiocache_server::cache::fetcher::{Fetcher, HttpFetcher};
use audiocache_server::cache::local::LocalBlobStore;
use audiocache_server::cache::sqlite::SqliteEntryStore;
use audiocache_server::cache::strategy::CacheFirst;
use audiocache_server::config::{self, ServerConfig};
use audiocache_server::precache::{self, PrecacheRoute};
use audiocache_server::{BlobStore, CacheState, EntryStore, server};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env().expect("Invalid server configuration");

    // STORAGE_DIR structure:
    //   - blobs/ (content-addressed response bodies)
    //   - cache.db (SQLite entry database)
    std::fs::create_dir_all(&config.storage_dir).expect("Failed to create storage directory");

    let entries: Arc<dyn EntryStore> = Arc::new(
        SqliteEntryStore::new(config.storage_dir.join("cache.db"))
            .expect("Failed to initialize cache entry store"),
    );
    let blobs: Arc<dyn BlobStore> = Arc::new(
        LocalBlobStore::new(config.storage_dir.join("blobs"))
            .expect("Failed to initialize blob store"),
    );
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(None).expect("Failed to build HTTP client"));

    // Select and warm the precache
    let manifest =
        precache::load_manifest(&config.manifest_path).expect("Failed to read precache manifest");
    let selected = precache::select_precache(&manifest, &precache::INITIAL_PRECACHE_URLS);

    let precache_strategy = CacheFirst::new(
        precache::PRECACHE_NAME,
        entries.clone(),
        blobs.clone(),
        fetcher.clone(),
    );
    let precache_route = PrecacheRoute::new(precache_strategy, &selected);

    match precache_route.warm(&selected, &config.upstream).await {
        Ok(warmed) => info!(
            "Precache warm-up complete: {} fetched of {} selected",
            warmed,
            selected.len()
        ),
        Err(e) => error!("Precache warm-up failed: {}", e),
    }

    // Runtime audio route with its eviction policy
    let audio = CacheFirst::new(config::AUDIO_CACHE_NAME, entries, blobs, fetcher.clone())
        .with_expiration(ExpirationPolicy::new(
            config::MAX_AUDIO_ENTRIES,
            config::MAX_AUDIO_AGE_SECONDS,
        ));

    let state = Arc::new(CacheState {
        precache: precache_route,
        audio,
        passthrough: fetcher,
        upstream: config.upstream.clone(),
    });

    let app = server::create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    info!(
        "Audio cache server listening on http://{} (upstream {})",
        config.bind_addr, config.upstream
    );
    info!("Storage directory: {}", config.storage_dir.display());

    axum::serve(listener, app).await.expect("Server error");
}
