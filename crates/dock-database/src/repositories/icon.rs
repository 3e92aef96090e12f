//! Hash-addressed icon blob repository.

use chrono::Utc;
use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::blob::IconBlob;

/// Repository for deduplicated, reference-counted icon blobs.
#[derive(Debug, Clone)]
pub struct IconBlobRepository {
    pool: SqlitePool,
}

impl IconBlobRepository {
    /// Create a new icon blob repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the blob with one reference, or add a reference to the
    /// existing row. A single statement, so concurrent identical uploads
    /// cannot double-insert.
    pub async fn insert_or_reference(&self, hash: &str, data: &[u8]) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO icon_blobs (hash, data, reference_count, created_at, last_accessed_at) \
             VALUES (?, ?, 1, ?, ?) \
             ON CONFLICT (hash) DO UPDATE SET \
                reference_count = icon_blobs.reference_count + 1, \
                last_accessed_at = excluded.last_accessed_at",
        )
        .bind(hash)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to store icon", e))?;
        Ok(())
    }

    /// Read blob bytes and refresh the access time.
    pub async fn read_and_touch(&self, hash: &str) -> AppResult<Option<Vec<u8>>> {
        sqlx::query_scalar::<_, Vec<u8>>(
            "UPDATE icon_blobs SET last_accessed_at = ? WHERE hash = ? RETURNING data",
        )
        .bind(Utc::now())
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read icon", e))
    }

    /// Find the full row without touching it.
    pub async fn find_by_hash(&self, hash: &str) -> AppResult<Option<IconBlob>> {
        sqlx::query_as::<_, IconBlob>("SELECT * FROM icon_blobs WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find icon", e))
    }

    /// Current reference count, `None` if the blob does not exist.
    pub async fn reference_count(&self, hash: &str) -> AppResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT reference_count FROM icon_blobs WHERE hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to read reference count", e)
            })
    }

    /// Drop one reference and delete the row once it reaches zero.
    ///
    /// Returns the remaining count (0 when deleted), or `None` if the blob
    /// did not exist.
    pub async fn release(&self, hash: &str) -> AppResult<Option<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin release", e))?;

        let remaining = sqlx::query_scalar::<_, i64>(
            "UPDATE icon_blobs SET reference_count = reference_count - 1 \
             WHERE hash = ? RETURNING reference_count",
        )
        .bind(hash)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to release icon", e))?;

        let remaining = match remaining {
            Some(count) if count <= 0 => {
                sqlx::query("DELETE FROM icon_blobs WHERE hash = ?")
                    .bind(hash)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to delete icon", e)
                    })?;
                Some(0)
            }
            other => other,
        };

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit release", e))?;
        Ok(remaining)
    }

    /// Delete every row whose reference count has drifted to zero or below.
    pub async fn delete_unreferenced(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM icon_blobs WHERE reference_count <= 0")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to clean up icons", e)
            })?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;

    #[tokio::test]
    async fn test_insert_then_reference() {
        let repo = IconBlobRepository::new(test_support::pool().await);
        repo.insert_or_reference("abc", b"png").await.unwrap();
        repo.insert_or_reference("abc", b"png").await.unwrap();
        assert_eq!(repo.reference_count("abc").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_release_deletes_at_zero() {
        let repo = IconBlobRepository::new(test_support::pool().await);
        repo.insert_or_reference("abc", b"png").await.unwrap();
        assert_eq!(repo.release("abc").await.unwrap(), Some(0));
        assert!(repo.find_by_hash("abc").await.unwrap().is_none());
        assert_eq!(repo.release("abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup_removes_drifted_rows() {
        let pool = test_support::pool().await;
        let repo = IconBlobRepository::new(pool.clone());
        repo.insert_or_reference("keep", b"a").await.unwrap();
        repo.insert_or_reference("drift", b"b").await.unwrap();
        sqlx::query("UPDATE icon_blobs SET reference_count = 0 WHERE hash = 'drift'")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(repo.delete_unreferenced().await.unwrap(), 1);
        assert_eq!(repo.delete_unreferenced().await.unwrap(), 0);
        assert!(repo.find_by_hash("keep").await.unwrap().is_some());
    }
}
