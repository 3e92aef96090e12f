//! Namespaced string key-value and settings storage.

pub mod data;
pub mod settings;

pub use data::PluginDataStore;
pub use settings::PluginSettingsStore;
