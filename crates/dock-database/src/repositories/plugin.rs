//! Plugin record repository implementation.

use chrono::Utc;
use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::plugin::{CreatePluginRecord, PluginRecord};

/// Repository for installed plugin records.
#[derive(Debug, Clone)]
pub struct PluginRecordRepository {
    pool: SqlitePool,
}

impl PluginRecordRepository {
    /// Create a new plugin record repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a record by plugin name.
    pub async fn find_by_name(&self, plugin_name: &str) -> AppResult<Option<PluginRecord>> {
        sqlx::query_as::<_, PluginRecord>("SELECT * FROM plugin_records WHERE plugin_name = ?")
            .bind(plugin_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find plugin record", e))
    }

    /// List every record ordered by name.
    pub async fn find_all(&self) -> AppResult<Vec<PluginRecord>> {
        sqlx::query_as::<_, PluginRecord>("SELECT * FROM plugin_records ORDER BY plugin_name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list plugin records", e))
    }

    /// Records marked for purge on startup.
    pub async fn find_pending_delete(&self) -> AppResult<Vec<PluginRecord>> {
        sqlx::query_as::<_, PluginRecord>(
            "SELECT * FROM plugin_records WHERE pending_delete = 1 ORDER BY plugin_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list pending deletions", e)
        })
    }

    /// Records with a staged update.
    pub async fn find_pending_update(&self) -> AppResult<Vec<PluginRecord>> {
        sqlx::query_as::<_, PluginRecord>(
            "SELECT * FROM plugin_records WHERE pending_update = 1 ORDER BY plugin_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list pending updates", e))
    }

    /// Insert a new record.
    pub async fn create(&self, data: &CreatePluginRecord) -> AppResult<PluginRecord> {
        let now = Utc::now();
        sqlx::query_as::<_, PluginRecord>(
            "INSERT INTO plugin_records \
                (plugin_name, display_name, version, description, author, is_enabled, \
                 pending_delete, pending_update, pending_version, installed_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, 0, NULL, ?, ?) \
             RETURNING *",
        )
        .bind(&data.plugin_name)
        .bind(&data.display_name)
        .bind(&data.version)
        .bind(&data.description)
        .bind(&data.author)
        .bind(data.is_enabled)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create plugin record", e))
    }

    /// Set the enable flag. Returns `false` when no record exists.
    pub async fn set_enabled(&self, plugin_name: &str, enabled: bool) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE plugin_records SET is_enabled = ?, updated_at = ? WHERE plugin_name = ?",
        )
        .bind(enabled)
        .bind(Utc::now())
        .bind(plugin_name)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update enable flag", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the pending-delete marker. Marking also disables.
    pub async fn set_pending_delete(&self, plugin_name: &str, pending: bool) -> AppResult<bool> {
        let sql = if pending {
            "UPDATE plugin_records SET pending_delete = 1, is_enabled = 0, updated_at = ? \
             WHERE plugin_name = ?"
        } else {
            "UPDATE plugin_records SET pending_delete = 0, updated_at = ? WHERE plugin_name = ?"
        };
        let result = sqlx::query(sql)
            .bind(Utc::now())
            .bind(plugin_name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update pending delete", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a staged update, or clear it with `None`.
    pub async fn set_pending_update(
        &self,
        plugin_name: &str,
        pending_version: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE plugin_records SET pending_update = ?, pending_version = ?, updated_at = ? \
             WHERE plugin_name = ?",
        )
        .bind(pending_version.is_some())
        .bind(pending_version)
        .bind(Utc::now())
        .bind(plugin_name)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update pending update", e)
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a completed update: new metadata, flags cleared.
    pub async fn complete_update(
        &self,
        plugin_name: &str,
        version: &str,
        display_name: &str,
        description: Option<&str>,
        author: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE plugin_records SET version = ?, display_name = ?, description = ?, author = ?, \
                pending_update = 0, pending_version = NULL, updated_at = ? \
             WHERE plugin_name = ?",
        )
        .bind(version)
        .bind(display_name)
        .bind(description)
        .bind(author)
        .bind(Utc::now())
        .bind(plugin_name)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete update", e))?;
        Ok(())
    }

    /// Delete a record.
    pub async fn delete(&self, plugin_name: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM plugin_records WHERE plugin_name = ?")
            .bind(plugin_name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete plugin record", e)
            })?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;

    fn notes() -> CreatePluginRecord {
        CreatePluginRecord {
            plugin_name: "com.acme.notes".to_string(),
            display_name: "Notes".to_string(),
            version: "1.0.0".to_string(),
            description: None,
            author: Some("Acme".to_string()),
            is_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = PluginRecordRepository::new(test_support::pool().await);
        let created = repo.create(&notes()).await.unwrap();
        assert!(created.is_enabled);
        assert!(!created.has_pending_action());

        let found = repo.find_by_name("com.acme.notes").await.unwrap().unwrap();
        assert_eq!(found.version, "1.0.0");
        assert!(repo.find_by_name("com.acme.other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let repo = PluginRecordRepository::new(test_support::pool().await);
        repo.create(&notes()).await.unwrap();
        let err = repo.create(&notes()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Database);
    }

    #[tokio::test]
    async fn test_pending_delete_disables() {
        let repo = PluginRecordRepository::new(test_support::pool().await);
        repo.create(&notes()).await.unwrap();
        assert!(repo.set_pending_delete("com.acme.notes", true).await.unwrap());

        let record = repo.find_by_name("com.acme.notes").await.unwrap().unwrap();
        assert!(record.pending_delete);
        assert!(!record.is_enabled);
        assert_eq!(repo.find_pending_delete().await.unwrap().len(), 1);

        repo.set_pending_delete("com.acme.notes", false).await.unwrap();
        assert!(repo.find_pending_delete().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_update_round_trip() {
        let repo = PluginRecordRepository::new(test_support::pool().await);
        repo.create(&notes()).await.unwrap();
        repo.set_pending_update("com.acme.notes", Some("1.1.0")).await.unwrap();

        let pending = repo.find_pending_update().await.unwrap();
        assert_eq!(pending[0].pending_version.as_deref(), Some("1.1.0"));

        repo.complete_update("com.acme.notes", "1.1.0", "Notes", Some("new"), None)
            .await
            .unwrap();
        let record = repo.find_by_name("com.acme.notes").await.unwrap().unwrap();
        assert_eq!(record.version, "1.1.0");
        assert!(!record.pending_update);
        assert!(record.pending_version.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_record_reports_false() {
        let repo = PluginRecordRepository::new(test_support::pool().await);
        assert!(!repo.set_enabled("com.acme.ghost", true).await.unwrap());
        assert!(!repo.delete("com.acme.ghost").await.unwrap());
    }
}
