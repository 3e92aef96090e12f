//! Per-plugin key-value and settings rows.

pub mod data;
pub mod settings;

pub use data::PluginDataEntry;
pub use settings::PluginSettingEntry;

/// Composite id `"{plugin}:{key}"` shared by data and settings rows.
pub fn compose_id(plugin_name: &str, key: &str) -> String {
    format!("{plugin_name}:{key}")
}
