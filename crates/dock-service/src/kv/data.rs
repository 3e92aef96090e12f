//! Plugin key-value store.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info};

use dock_core::error::AppError;
use dock_database::repositories::PluginDataRepository;

use crate::blob::PluginImageStore;

/// Opaque string values keyed by `"{plugin}:{key}"`.
///
/// Values are never typed by the host; each plugin decides its own encoding.
#[derive(Debug, Clone)]
pub struct PluginDataStore {
    repo: Arc<PluginDataRepository>,
    images: PluginImageStore,
}

impl PluginDataStore {
    /// Creates a new data store. `images` is purged together with the data.
    pub fn new(pool: SqlitePool, images: PluginImageStore) -> Self {
        Self {
            repo: Arc::new(PluginDataRepository::new(pool)),
            images,
        }
    }

    /// Read a value.
    pub async fn get(&self, plugin_name: &str, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.repo.find(plugin_name, key).await?.map(|entry| entry.value))
    }

    /// Insert or overwrite a value.
    pub async fn set(&self, plugin_name: &str, key: &str, value: &str) -> Result<(), AppError> {
        self.repo.upsert(plugin_name, key, value).await?;
        debug!(plugin = %plugin_name, key = %key, "Plugin value set");
        Ok(())
    }

    /// Delete a value. Returns whether one existed.
    pub async fn delete(&self, plugin_name: &str, key: &str) -> Result<bool, AppError> {
        self.repo.delete(plugin_name, key).await
    }

    /// Every key a plugin has stored.
    pub async fn list_keys(&self, plugin_name: &str) -> Result<Vec<String>, AppError> {
        self.repo.list_keys(plugin_name).await
    }

    /// Delete every value of a plugin and every image under its prefix.
    /// Returns the number of values removed.
    pub async fn delete_all(&self, plugin_name: &str) -> Result<u64, AppError> {
        let values = self.repo.delete_by_plugin(plugin_name).await?;
        let images = self.images.delete_all(plugin_name).await?;
        info!(plugin = %plugin_name, values, images, "Plugin data purged");
        Ok(values)
    }
}
