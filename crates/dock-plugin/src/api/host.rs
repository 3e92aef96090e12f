//! [`PluginHost`] implementation over the persistent stores.
//!
//! Plugin hooks run on blocking threads, so each call drives the async
//! store on the captured runtime handle. Calling these methods from an
//! async task would block a runtime worker and is not supported.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use dock_core::error::AppError;
use dock_core::result::AppResult;
use dock_core::traits::{LogLevel, PluginHost};
use dock_service::PluginStores;

use crate::manifest::PluginManifest;
use crate::package::DATA_DIR_NAME;

/// Host handle scoped to one plugin.
pub struct DockPluginHost {
    plugin_name: String,
    dependencies: BTreeSet<String>,
    plugin_dir: PathBuf,
    stores: PluginStores,
    runtime: Handle,
}

impl DockPluginHost {
    /// Create a host for the plugin described by `manifest`, living in
    /// `plugin_dir`.
    pub fn new(
        manifest: &PluginManifest,
        plugin_dir: PathBuf,
        stores: PluginStores,
        runtime: Handle,
    ) -> Self {
        Self {
            plugin_name: manifest.name.clone(),
            dependencies: manifest.dependencies.keys().cloned().collect(),
            plugin_dir,
            stores,
            runtime,
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn ensure_declared(&self, dependency: &str) -> AppResult<()> {
        if self.dependencies.contains(dependency) {
            Ok(())
        } else {
            Err(AppError::invalid_operation(format!(
                "Plugin '{}' has not declared a dependency on '{}'",
                self.plugin_name, dependency
            )))
        }
    }
}

impl PluginHost for DockPluginHost {
    fn plugin_name(&self) -> String {
        self.plugin_name.clone()
    }

    fn log(&self, level: LogLevel, message: &str) {
        let plugin = self.plugin_name.as_str();
        match level {
            LogLevel::Debug => debug!(plugin = %plugin, "{message}"),
            LogLevel::Info => info!(plugin = %plugin, "{message}"),
            LogLevel::Warn => warn!(plugin = %plugin, "{message}"),
            LogLevel::Error => error!(plugin = %plugin, "{message}"),
        }
    }

    fn get_value(&self, key: &str) -> AppResult<Option<String>> {
        self.block_on(self.stores.data.get(&self.plugin_name, key))
    }

    fn set_value(&self, key: &str, value: &str) -> AppResult<()> {
        self.block_on(self.stores.data.set(&self.plugin_name, key, value))
    }

    fn delete_value(&self, key: &str) -> AppResult<()> {
        self.block_on(self.stores.data.delete(&self.plugin_name, key))
            .map(|_| ())
    }

    fn value_keys(&self) -> AppResult<Vec<String>> {
        self.block_on(self.stores.data.list_keys(&self.plugin_name))
    }

    fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        self.block_on(self.stores.settings.get(&self.plugin_name, key))
    }

    fn set_setting(&self, key: &str, value: &str, description: Option<&str>) -> AppResult<()> {
        self.block_on(
            self.stores
                .settings
                .set(&self.plugin_name, key, value, description),
        )
    }

    fn delete_setting(&self, key: &str) -> AppResult<()> {
        self.block_on(self.stores.settings.delete(&self.plugin_name, key))
            .map(|_| ())
    }

    fn setting_keys(&self) -> AppResult<Vec<String>> {
        self.block_on(self.stores.settings.list_keys(&self.plugin_name))
    }

    fn save_image(&self, key: &str, data: &[u8]) -> AppResult<()> {
        self.block_on(self.stores.images.put(&self.plugin_name, key, data))
    }

    fn load_image(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.block_on(self.stores.images.get(&self.plugin_name, key))
    }

    fn delete_image(&self, key: &str) -> AppResult<()> {
        self.block_on(self.stores.images.delete(&self.plugin_name, key))
            .map(|_| ())
    }

    fn dependency_value(&self, dependency: &str, key: &str) -> AppResult<Option<String>> {
        self.ensure_declared(dependency)?;
        self.block_on(self.stores.data.get(dependency, key))
    }

    fn dependency_value_keys(&self, dependency: &str) -> AppResult<Vec<String>> {
        self.ensure_declared(dependency)?;
        self.block_on(self.stores.data.list_keys(dependency))
    }

    fn dependency_setting(&self, dependency: &str, key: &str) -> AppResult<Option<String>> {
        self.ensure_declared(dependency)?;
        self.block_on(self.stores.settings.get(dependency, key))
    }

    fn dependency_setting_keys(&self, dependency: &str) -> AppResult<Vec<String>> {
        self.ensure_declared(dependency)?;
        self.block_on(self.stores.settings.list_keys(dependency))
    }

    fn config_directory(&self) -> PathBuf {
        self.plugin_dir.clone()
    }

    fn data_directory(&self) -> PathBuf {
        let dir = self.plugin_dir.join(DATA_DIR_NAME);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(plugin = %self.plugin_name, error = %e, "Failed to create data directory");
        }
        dir
    }
}

impl std::fmt::Debug for DockPluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockPluginHost")
            .field("plugin_name", &self.plugin_name)
            .field("dependencies", &self.dependencies)
            .field("plugin_dir", &self.plugin_dir)
            .finish()
    }
}
