//! Explicit application context built once at startup.

use std::sync::Arc;

use dock_core::config::AppConfig;
use dock_database::DatabasePool;
use dock_service::PluginStores;

use crate::loader::PluginLoader;
use crate::manager::PluginManager;

/// Everything the host needs, passed by reference instead of held in
/// globals.
#[derive(Debug, Clone)]
pub struct DockContext {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Database pool.
    pub db: DatabasePool,
    /// Persistent plugin state.
    pub stores: PluginStores,
    /// Plugin lifecycle.
    pub manager: Arc<PluginManager>,
}

impl DockContext {
    /// Wire stores and the plugin manager over `db`.
    pub fn new(config: AppConfig, db: DatabasePool, loader: Arc<dyn PluginLoader>) -> Self {
        let stores = PluginStores::new(db.pool().clone());
        let manager = PluginManager::new(
            config.plugins.clone(),
            db.pool().clone(),
            stores.clone(),
            loader,
        );
        Self {
            config: Arc::new(config),
            db,
            stores,
            manager: Arc::new(manager),
        }
    }
}
