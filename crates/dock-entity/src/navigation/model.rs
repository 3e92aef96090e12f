//! Navigation tab configuration entity.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted placement of one navigation tab.
///
/// Keyed by `"{owner}:{tabClass}"`, independent of any loaded plugin
/// instance, so disabling or reinstalling a plugin keeps the user's
/// ordering, visibility and lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NavigationTabConfig {
    /// Tab id (primary key).
    pub id: String,
    /// Position in the navigation bar.
    pub order_index: i64,
    /// Whether the tab is shown.
    pub is_visible: bool,
    /// Optional keyboard shortcut.
    pub shortcut_key: Option<String>,
    /// Whether opening the tab requires unlocking.
    pub is_locked: bool,
    /// Hash checked by the UI when unlocking.
    pub password_hash: Option<String>,
}

impl NavigationTabConfig {
    /// Owner part of the tab id.
    pub fn owner(&self) -> &str {
        self.id.split_once(':').map(|(owner, _)| owner).unwrap_or(&self.id)
    }
}
