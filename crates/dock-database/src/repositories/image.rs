//! Name-addressed plugin image repository.

use chrono::Utc;
use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::blob::PluginImage;

/// Repository for plugin-owned images keyed by `"{plugin}:IMG:{key}"`.
#[derive(Debug, Clone)]
pub struct PluginImageRepository {
    pool: SqlitePool,
}

impl PluginImageRepository {
    /// Create a new plugin image repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite an image in place.
    pub async fn upsert(&self, plugin_name: &str, image_key: &str, data: &[u8]) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO plugin_images \
                (id, plugin_name, image_key, data, reference_count, created_at, last_accessed_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
                data = excluded.data, \
                last_accessed_at = excluded.last_accessed_at",
        )
        .bind(PluginImage::compose_id(plugin_name, image_key))
        .bind(plugin_name)
        .bind(image_key)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save plugin image", e))?;
        Ok(())
    }

    /// Read image bytes and refresh the access time.
    pub async fn read_and_touch(
        &self,
        plugin_name: &str,
        image_key: &str,
    ) -> AppResult<Option<Vec<u8>>> {
        sqlx::query_scalar::<_, Vec<u8>>(
            "UPDATE plugin_images SET last_accessed_at = ? WHERE id = ? RETURNING data",
        )
        .bind(Utc::now())
        .bind(PluginImage::compose_id(plugin_name, image_key))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load plugin image", e))
    }

    /// Delete one image.
    pub async fn delete(&self, plugin_name: &str, image_key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM plugin_images WHERE id = ?")
            .bind(PluginImage::compose_id(plugin_name, image_key))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete plugin image", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every image of a plugin.
    pub async fn delete_by_plugin(&self, plugin_name: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM plugin_images WHERE plugin_name = ?")
            .bind(plugin_name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge plugin images", e)
            })?;
        Ok(result.rows_affected())
    }

    /// List image keys of a plugin.
    pub async fn list_keys(&self, plugin_name: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT image_key FROM plugin_images WHERE plugin_name = ? ORDER BY image_key",
        )
        .bind(plugin_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list plugin images", e))
    }
}
