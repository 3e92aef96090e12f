//! Plugin key-value entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An opaque string value stored by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginDataEntry {
    /// Composite id `"{plugin}:{key}"` (primary key).
    pub id: String,
    /// Owning plugin.
    pub plugin_name: String,
    /// Plugin-local key.
    pub key: String,
    /// Stored value.
    pub value: String,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the value last changed.
    pub updated_at: DateTime<Utc>,
}
