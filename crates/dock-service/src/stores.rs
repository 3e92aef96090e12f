//! Aggregate of every plugin state store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use dock_core::error::AppError;

use crate::blob::{IconStore, PluginImageStore};
use crate::kv::{PluginDataStore, PluginSettingsStore};
use crate::navigation::NavigationRegistry;
use crate::tools::ToolStatisticsStore;

/// Counts of rows removed by [`PluginStores::purge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Key-value entries.
    pub data_entries: u64,
    /// Settings entries.
    pub settings_entries: u64,
    /// Plugin images.
    pub images: u64,
    /// Navigation tabs.
    pub tabs: u64,
    /// Tool statistics rows.
    pub tool_statistics: u64,
}

/// Every store a plugin's state lives in, sharing one pool.
#[derive(Debug, Clone)]
pub struct PluginStores {
    /// Hash-addressed icons.
    pub icons: IconStore,
    /// Name-addressed plugin images.
    pub images: PluginImageStore,
    /// Key-value data.
    pub data: PluginDataStore,
    /// Settings.
    pub settings: PluginSettingsStore,
    /// Navigation tab placement.
    pub navigation: Arc<NavigationRegistry>,
    /// Tool statistics.
    pub tools: ToolStatisticsStore,
}

impl PluginStores {
    /// Build every store over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        let images = PluginImageStore::new(pool.clone());
        Self {
            icons: IconStore::new(pool.clone()),
            data: PluginDataStore::new(pool.clone(), images.clone()),
            images,
            settings: PluginSettingsStore::new(pool.clone()),
            navigation: NavigationRegistry::shared(pool.clone()),
            tools: ToolStatisticsStore::new(pool),
        }
    }

    /// Remove every piece of persisted state owned by `plugin_name`.
    pub async fn purge(&self, plugin_name: &str) -> Result<PurgeReport, AppError> {
        let images = self.images.list_keys(plugin_name).await?.len() as u64;
        let report = PurgeReport {
            data_entries: self.data.delete_all(plugin_name).await?,
            settings_entries: self.settings.delete_all(plugin_name).await?,
            images,
            tabs: self.navigation.delete_for_owner(plugin_name).await?,
            tool_statistics: self.tools.delete_all(plugin_name).await?,
        };
        info!(plugin = %plugin_name, ?report, "Plugin state purged");
        Ok(report)
    }
}
