//! Name-addressed plugin image.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Separator between plugin name and image key in the composite id.
pub const IMAGE_KEY_SEPARATOR: &str = ":IMG:";

/// An image owned by a plugin, overwritten in place on every save.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PluginImage {
    /// Composite id `"{plugin}:IMG:{key}"` (primary key).
    pub id: String,
    /// Owning plugin.
    pub plugin_name: String,
    /// Plugin-local image key.
    pub image_key: String,
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Always 1; images are not shared.
    pub reference_count: i64,
    /// When the image was first stored.
    pub created_at: DateTime<Utc>,
    /// When the image was last read or written.
    pub last_accessed_at: DateTime<Utc>,
}

impl PluginImage {
    /// Composite id for a plugin image.
    pub fn compose_id(plugin_name: &str, image_key: &str) -> String {
        format!("{plugin_name}{IMAGE_KEY_SEPARATOR}{image_key}")
    }
}
