//! # dock-plugin
//!
//! Plugin runtime for the dock host. Provides:
//!
//! - Manifest parsing and validation
//! - Dependency resolution between plugins
//! - Isolated load contexts (one library per plugin, `dynamic` feature)
//! - The instance lifecycle state machine with guarded hook calls
//! - The lifecycle manager: install, enable/disable, two-phase
//!   update and uninstall, tool invocation

pub mod api;
pub mod context;
pub mod dependency;
pub mod error;
pub mod ffi;
pub mod instance;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod outcome;
pub mod package;
pub mod prelude;
pub mod registry;

pub use context::DockContext;
pub use instance::{InstanceState, PluginInstance};
pub use loader::{PluginLoader, StaticPluginLoader};
pub use manager::PluginManager;
pub use manifest::PluginManifest;
pub use outcome::{InstallOutcome, OperationOutcome, ToolOutcome};
pub use registry::{PluginInfo, PluginRegistry};

#[cfg(feature = "dynamic")]
pub use loader::DynamicLibraryLoader;

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
