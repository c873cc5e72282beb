//! Local filesystem implementation of the BlobStore trait

use crate::cache::{BlobStore, CacheError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Local filesystem-backed implementation of BlobStore
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local blob store
    ///
    /// The base_path will be created if it doesn't exist.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, CacheError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        info!("Initialized LocalBlobStore at {:?}", base_path);
        Ok(Self { base_path })
    }

    /// Get the filesystem path for a given hash
    ///
    /// Uses a nested directory structure: {hash[0:2]}/{hash[2:4]}/{hash[4:]}
    /// Works with SHA-256 (64 hex chars) or any hash string.
    fn hash_to_path(&self, hash: &str) -> PathBuf {
        if hash.len() < 4 {
            // Fallback for short hashes
            return self.base_path.join(hash);
        }

        let dir1 = &hash[0..2];
        let dir2 = &hash[2..4];
        let filename = &hash[4..];

        self.base_path.join(dir1).join(dir2).join(filename)
    }

    /// Store data atomically using a temporary file
    fn put_atomic(&self, hash: &str, data: &[u8]) -> Result<(), CacheError> {
        let final_path = self.hash_to_path(hash);

        // Create parent directories
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temporary file first
        let temp_path = final_path.with_extension(".tmp");
        fs::write(&temp_path, data)?;

        // Atomically move to final location
        fs::rename(&temp_path, &final_path)?;

        debug!("Stored blob {} at {:?}", hash, final_path);
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, hash: &str, data: &[u8]) -> Result<(), CacheError> {
        // Use tokio::task::spawn_blocking for filesystem I/O
        let store = self.clone();
        let hash = hash.to_string();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || store.put_atomic(&hash, &data))
            .await
            .map_err(|e| CacheError::Storage(Box::new(e)))?
    }

    async fn exists(&self, hash: &str) -> Result<bool, CacheError> {
        let path = self.hash_to_path(hash);
        Ok(path.exists())
    }

    async fn get(&self, hash: &str) -> Result<Vec<u8>, CacheError> {
        let path = self.hash_to_path(hash);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NotFound(hash.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, hash: &str) -> Result<(), CacheError> {
        let path = self.hash_to_path(hash);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed blob {}", hash);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// Clone implementation for LocalBlobStore (needed for spawn_blocking)
impl Clone for LocalBlobStore {
    fn clone(&self) -> Self {
        Self {
            base_path: self.base_path.clone(),
        }
    }
}
