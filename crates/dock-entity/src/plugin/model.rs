//! Plugin record entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted state of an installed plugin.
///
/// The record outlives any loaded instance; it carries the enable flag
/// and the two-phase uninstall/update markers processed at startup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginRecord {
    /// Unique reverse-domain plugin name (primary key).
    pub plugin_name: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Installed version.
    pub version: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional author.
    pub author: Option<String>,
    /// Whether the plugin should be enabled.
    pub is_enabled: bool,
    /// Marked for purge on next startup.
    pub pending_delete: bool,
    /// Staged update waiting for next startup.
    pub pending_update: bool,
    /// Version of the staged update.
    pub pending_version: Option<String>,
    /// When the plugin was first installed.
    pub installed_at: DateTime<Utc>,
    /// When the record was last changed.
    pub updated_at: DateTime<Utc>,
}

impl PluginRecord {
    /// Whether any deferred action is waiting for the next startup.
    pub fn has_pending_action(&self) -> bool {
        self.pending_delete || self.pending_update
    }
}

/// Data required to create a plugin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePluginRecord {
    /// Unique plugin name.
    pub plugin_name: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Installed version.
    pub version: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional author.
    pub author: Option<String>,
    /// Initial enable flag.
    pub is_enabled: bool,
}
