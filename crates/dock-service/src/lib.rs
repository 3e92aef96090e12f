//! # dock-service
//!
//! Persistent plugin state for the dock host. Each store wraps one or more
//! repositories and is keyed by stable plugin-name-qualified identifiers,
//! so state outlives any single loaded plugin instance.
//!
//! Stores are cheap to clone and safe to share across threads.

pub mod blob;
pub mod kv;
pub mod navigation;
pub mod stores;
pub mod tools;

pub use blob::{IconStore, PluginImageStore};
pub use kv::{PluginDataStore, PluginSettingsStore};
pub use navigation::NavigationRegistry;
pub use stores::{PluginStores, PurgeReport};
pub use tools::ToolStatisticsStore;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;

    use dock_database::DatabasePool;
    use dock_database::migration::run_migrations;

    /// Fresh migrated in-memory database.
    pub async fn pool() -> SqlitePool {
        let db = DatabasePool::in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        db.into_pool()
    }
}
