//! Plugin settings entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A plugin setting with a human-readable description for settings UIs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginSettingEntry {
    /// Composite id `"{plugin}:{key}"` (primary key).
    pub id: String,
    /// Owning plugin.
    pub plugin_name: String,
    /// Plugin-local key.
    pub key: String,
    /// Stored value.
    pub value: String,
    /// Description shown next to the value; defaults to the key.
    pub description: String,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the value last changed.
    pub updated_at: DateTime<Utc>,
}
