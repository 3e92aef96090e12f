//! Plugin runtime configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Plugin runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Root directory holding one folder per installed plugin.
    #[serde(default = "default_plugin_directory")]
    pub directory: String,
    /// Directory used for archive extraction and staged updates.
    #[serde(default = "default_staging_directory")]
    pub staging_directory: String,
    /// Whether to discover and load plugins on startup.
    #[serde(default = "default_true")]
    pub auto_load: bool,
    /// Maximum total uncompressed size of a plugin package, in bytes.
    #[serde(default = "default_max_package_bytes")]
    pub max_package_bytes: u64,
    /// Maximum number of entries in a plugin package.
    #[serde(default = "default_max_package_entries")]
    pub max_package_entries: usize,
}

impl PluginConfig {
    /// Plugin root as a path.
    pub fn plugin_root(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }

    /// Staging root as a path.
    pub fn staging_root(&self) -> PathBuf {
        PathBuf::from(&self.staging_directory)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_directory(),
            staging_directory: default_staging_directory(),
            auto_load: true,
            max_package_bytes: default_max_package_bytes(),
            max_package_entries: default_max_package_entries(),
        }
    }
}

fn default_plugin_directory() -> String {
    "./plugins".to_string()
}

fn default_staging_directory() -> String {
    "./staging".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_package_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_max_package_entries() -> usize {
    10_000
}
