//! Hash-addressed icon store with reference counting.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::debug;

use dock_core::error::AppError;
use dock_database::repositories::IconBlobRepository;

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Deduplicating icon store.
///
/// Identical bytes uploaded by different owners share one row; each
/// `put` adds a reference and each `release` drops one. The row is
/// deleted as soon as its count reaches zero.
#[derive(Debug, Clone)]
pub struct IconStore {
    repo: Arc<IconBlobRepository>,
}

impl IconStore {
    /// Creates a new icon store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: Arc::new(IconBlobRepository::new(pool)),
        }
    }

    /// Store `data` and return its hash handle.
    ///
    /// Empty input stores nothing and returns an empty handle.
    pub async fn put(&self, data: &[u8]) -> Result<String, AppError> {
        if data.is_empty() {
            return Ok(String::new());
        }
        let hash = content_hash(data);
        self.repo.insert_or_reference(&hash, data).await?;
        debug!(hash = %hash, bytes = data.len(), "Icon referenced");
        Ok(hash)
    }

    /// Bytes for a hash. Empty or unknown handles yield `None`.
    pub async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, AppError> {
        if hash.is_empty() {
            return Ok(None);
        }
        self.repo.read_and_touch(hash).await
    }

    /// Drop one reference; the blob is deleted when none remain.
    pub async fn release(&self, hash: &str) -> Result<(), AppError> {
        if hash.is_empty() {
            return Ok(());
        }
        match self.repo.release(hash).await? {
            Some(0) => debug!(hash = %hash, "Icon deleted"),
            Some(remaining) => debug!(hash = %hash, remaining, "Icon released"),
            None => debug!(hash = %hash, "Release of unknown icon ignored"),
        }
        Ok(())
    }

    /// Current reference count; 0 for unknown handles.
    pub async fn reference_count(&self, hash: &str) -> Result<i64, AppError> {
        Ok(self.repo.reference_count(hash).await?.unwrap_or(0))
    }

    /// Delete rows whose count drifted to zero. Returns how many were removed.
    pub async fn cleanup_unused(&self) -> Result<u64, AppError> {
        let removed = self.repo.delete_unreferenced().await?;
        if removed > 0 {
            debug!(removed, "Unreferenced icons removed");
        }
        Ok(removed)
    }
}
