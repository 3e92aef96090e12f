//! Plugin key-value repository.

use chrono::Utc;
use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::kv::{PluginDataEntry, compose_id};

/// Repository for plugin key-value entries.
#[derive(Debug, Clone)]
pub struct PluginDataRepository {
    pool: SqlitePool,
}

impl PluginDataRepository {
    /// Create a new plugin data repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find an entry.
    pub async fn find(&self, plugin_name: &str, key: &str) -> AppResult<Option<PluginDataEntry>> {
        sqlx::query_as::<_, PluginDataEntry>("SELECT * FROM plugin_data WHERE id = ?")
            .bind(compose_id(plugin_name, key))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read plugin data", e))
    }

    /// Insert or update an entry, touching `updated_at`.
    pub async fn upsert(&self, plugin_name: &str, key: &str, value: &str) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO plugin_data (id, plugin_name, key, value, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
                value = excluded.value, \
                updated_at = excluded.updated_at",
        )
        .bind(compose_id(plugin_name, key))
        .bind(plugin_name)
        .bind(key)
        .bind(value)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to write plugin data", e))?;
        Ok(())
    }

    /// Delete an entry.
    pub async fn delete(&self, plugin_name: &str, key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM plugin_data WHERE id = ?")
            .bind(compose_id(plugin_name, key))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete plugin data", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// List keys of a plugin.
    pub async fn list_keys(&self, plugin_name: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT key FROM plugin_data WHERE plugin_name = ? ORDER BY key",
        )
        .bind(plugin_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list plugin data", e))
    }

    /// Delete every entry of a plugin.
    pub async fn delete_by_plugin(&self, plugin_name: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM plugin_data WHERE plugin_name = ?")
            .bind(plugin_name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge plugin data", e)
            })?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;

    #[tokio::test]
    async fn test_upsert_touches_updated_at() {
        let repo = PluginDataRepository::new(test_support::pool().await);
        repo.upsert("p", "k", "v1").await.unwrap();
        let first = repo.find("p", "k").await.unwrap().unwrap();
        repo.upsert("p", "k", "v2").await.unwrap();
        let second = repo.find("p", "k").await.unwrap().unwrap();

        assert_eq!(second.value, "v2");
        assert_eq!(second.id, "p:k");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }
}
