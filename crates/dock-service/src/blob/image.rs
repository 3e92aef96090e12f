//! Name-addressed plugin image store.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::debug;

use dock_core::error::AppError;
use dock_database::repositories::PluginImageRepository;

/// Plugin-owned images keyed by `"{plugin}:IMG:{key}"`.
///
/// Saves overwrite in place; lifetime is tied to the key, not to content.
#[derive(Debug, Clone)]
pub struct PluginImageStore {
    repo: Arc<PluginImageRepository>,
}

impl PluginImageStore {
    /// Creates a new image store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: Arc::new(PluginImageRepository::new(pool)),
        }
    }

    /// Save or replace an image.
    pub async fn put(&self, plugin_name: &str, key: &str, data: &[u8]) -> Result<(), AppError> {
        self.repo.upsert(plugin_name, key, data).await?;
        debug!(plugin = %plugin_name, key = %key, bytes = data.len(), "Plugin image saved");
        Ok(())
    }

    /// Load an image.
    pub async fn get(&self, plugin_name: &str, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        self.repo.read_and_touch(plugin_name, key).await
    }

    /// Delete an image. Returns whether one existed.
    pub async fn delete(&self, plugin_name: &str, key: &str) -> Result<bool, AppError> {
        self.repo.delete(plugin_name, key).await
    }

    /// Keys of every image a plugin owns.
    pub async fn list_keys(&self, plugin_name: &str) -> Result<Vec<String>, AppError> {
        self.repo.list_keys(plugin_name).await
    }

    /// Delete every image a plugin owns.
    pub async fn delete_all(&self, plugin_name: &str) -> Result<u64, AppError> {
        self.repo.delete_by_plugin(plugin_name).await
    }
}
