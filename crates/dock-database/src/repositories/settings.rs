//! Plugin settings repository.

use chrono::Utc;
use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::kv::{PluginSettingEntry, compose_id};

/// Repository for plugin settings entries.
#[derive(Debug, Clone)]
pub struct PluginSettingsRepository {
    pool: SqlitePool,
}

impl PluginSettingsRepository {
    /// Create a new plugin settings repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a setting.
    pub async fn find(
        &self,
        plugin_name: &str,
        key: &str,
    ) -> AppResult<Option<PluginSettingEntry>> {
        sqlx::query_as::<_, PluginSettingEntry>("SELECT * FROM plugin_settings WHERE id = ?")
            .bind(compose_id(plugin_name, key))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read setting", e))
    }

    /// Insert or update a setting.
    ///
    /// A new row without a description uses the key. An update without a
    /// description keeps the stored one.
    pub async fn upsert(
        &self,
        plugin_name: &str,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO plugin_settings \
                (id, plugin_name, key, value, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
                value = excluded.value, \
                description = COALESCE(?, plugin_settings.description), \
                updated_at = excluded.updated_at",
        )
        .bind(compose_id(plugin_name, key))
        .bind(plugin_name)
        .bind(key)
        .bind(value)
        .bind(description.unwrap_or(key))
        .bind(now)
        .bind(now)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to write setting", e))?;
        Ok(())
    }

    /// Delete a setting.
    pub async fn delete(&self, plugin_name: &str, key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM plugin_settings WHERE id = ?")
            .bind(compose_id(plugin_name, key))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete setting", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// List setting keys of a plugin.
    pub async fn list_keys(&self, plugin_name: &str) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT key FROM plugin_settings WHERE plugin_name = ? ORDER BY key",
        )
        .bind(plugin_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list settings", e))
    }

    /// List full setting rows of a plugin.
    pub async fn find_by_plugin(&self, plugin_name: &str) -> AppResult<Vec<PluginSettingEntry>> {
        sqlx::query_as::<_, PluginSettingEntry>(
            "SELECT * FROM plugin_settings WHERE plugin_name = ? ORDER BY key",
        )
        .bind(plugin_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list settings", e))
    }

    /// Delete every setting of a plugin.
    pub async fn delete_by_plugin(&self, plugin_name: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM plugin_settings WHERE plugin_name = ?")
            .bind(plugin_name)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge settings", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;

    #[tokio::test]
    async fn test_description_defaults_and_persists() {
        let repo = PluginSettingsRepository::new(test_support::pool().await);
        repo.upsert("p", "theme", "dark", None).await.unwrap();
        assert_eq!(repo.find("p", "theme").await.unwrap().unwrap().description, "theme");

        repo.upsert("p", "theme", "light", Some("Colour theme")).await.unwrap();
        repo.upsert("p", "theme", "dark", None).await.unwrap();
        let entry = repo.find("p", "theme").await.unwrap().unwrap();
        assert_eq!(entry.value, "dark");
        assert_eq!(entry.description, "Colour theme");
    }
}
