//! Plugin settings store.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info};

use dock_core::error::AppError;
use dock_database::repositories::PluginSettingsRepository;
use dock_entity::kv::PluginSettingEntry;

/// Plugin settings: string values with a description for settings UIs.
#[derive(Debug, Clone)]
pub struct PluginSettingsStore {
    repo: Arc<PluginSettingsRepository>,
}

impl PluginSettingsStore {
    /// Creates a new settings store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: Arc::new(PluginSettingsRepository::new(pool)),
        }
    }

    /// Read a setting value.
    pub async fn get(&self, plugin_name: &str, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.repo.find(plugin_name, key).await?.map(|entry| entry.value))
    }

    /// Read the full setting row.
    pub async fn get_entry(
        &self,
        plugin_name: &str,
        key: &str,
    ) -> Result<Option<PluginSettingEntry>, AppError> {
        self.repo.find(plugin_name, key).await
    }

    /// Every setting row of a plugin, ordered by key.
    pub async fn list_entries(&self, plugin_name: &str) -> Result<Vec<PluginSettingEntry>, AppError> {
        self.repo.find_by_plugin(plugin_name).await
    }

    /// Insert or overwrite a setting. The description defaults to the key.
    pub async fn set(
        &self,
        plugin_name: &str,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        self.repo.upsert(plugin_name, key, value, description).await?;
        debug!(plugin = %plugin_name, key = %key, "Plugin setting set");
        Ok(())
    }

    /// Delete a setting. Returns whether one existed.
    pub async fn delete(&self, plugin_name: &str, key: &str) -> Result<bool, AppError> {
        self.repo.delete(plugin_name, key).await
    }

    /// Every setting key of a plugin.
    pub async fn list_keys(&self, plugin_name: &str) -> Result<Vec<String>, AppError> {
        self.repo.list_keys(plugin_name).await
    }

    /// Delete every setting of a plugin.
    pub async fn delete_all(&self, plugin_name: &str) -> Result<u64, AppError> {
        let removed = self.repo.delete_by_plugin(plugin_name).await?;
        info!(plugin = %plugin_name, removed, "Plugin settings purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn test_settings_round_trip() {
        let store = PluginSettingsStore::new(test_support::pool().await);
        store.set("p", "interval", "30", Some("Sync interval (s)")).await.unwrap();
        store.set("p", "theme", "dark", None).await.unwrap();

        assert_eq!(store.get("p", "interval").await.unwrap().as_deref(), Some("30"));
        let entries = store.list_entries("p").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "Sync interval (s)");
        assert_eq!(entries[1].description, "theme");

        assert_eq!(store.delete_all("p").await.unwrap(), 2);
        assert!(store.list_keys("p").await.unwrap().is_empty());
    }
}
