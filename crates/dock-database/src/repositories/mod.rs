//! Repository implementations for every persisted dock table.

pub mod data;
pub mod icon;
pub mod image;
pub mod navigation;
pub mod plugin;
pub mod settings;
pub mod tool_statistics;

pub use data::PluginDataRepository;
pub use icon::IconBlobRepository;
pub use image::PluginImageRepository;
pub use navigation::NavigationTabRepository;
pub use plugin::PluginRecordRepository;
pub use settings::PluginSettingsRepository;
pub use tool_statistics::ToolStatisticsRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;

    use crate::connection::DatabasePool;
    use crate::migration::run_migrations;

    /// Fresh migrated in-memory database.
    pub async fn pool() -> SqlitePool {
        let db = DatabasePool::in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        db.into_pool()
    }
}
