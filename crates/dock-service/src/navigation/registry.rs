//! Navigation registry: cached, persisted tab placement.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use dock_core::error::AppError;
use dock_database::repositories::NavigationTabRepository;
use dock_entity::navigation::NavigationTabConfig;

/// Stable tab id for a tab class contributed by `owner`.
pub fn tab_id(owner: &str, tab_class: &str) -> String {
    format!("{owner}:{tab_class}")
}

/// Persisted tab placement keyed by tab id.
///
/// Rows are created lazily the first time an id is referenced and are
/// independent of any plugin instance. Only an uninstall purge removes
/// them. The in-memory cache is write-through; mutations hold the cache
/// write lock across the database write so the two never disagree.
#[derive(Debug)]
pub struct NavigationRegistry {
    repo: NavigationTabRepository,
    cache: RwLock<HashMap<String, NavigationTabConfig>>,
}

impl NavigationRegistry {
    /// Creates a new registry.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: NavigationTabRepository::new(pool),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a shared registry.
    pub fn shared(pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self::new(pool))
    }

    /// Configuration for `id`, creating the default (appended, visible,
    /// unlocked) if none exists.
    pub async fn get_or_create(&self, id: &str) -> Result<NavigationTabConfig, AppError> {
        if let Some(tab) = self.cache.read().await.get(id) {
            return Ok(tab.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(tab) = cache.get(id) {
            return Ok(tab.clone());
        }
        let tab = self.repo.get_or_insert_default(id).await?;
        debug!(tab = %id, order = tab.order_index, "Navigation tab registered");
        cache.insert(id.to_string(), tab.clone());
        Ok(tab)
    }

    /// Every known tab in display order.
    pub async fn list(&self) -> Result<Vec<NavigationTabConfig>, AppError> {
        let tabs = self.repo.find_all().await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        cache.extend(tabs.iter().map(|tab| (tab.id.clone(), tab.clone())));
        Ok(tabs)
    }

    /// Show or hide a tab.
    pub async fn set_visible(&self, id: &str, visible: bool) -> Result<NavigationTabConfig, AppError> {
        self.modify(id, |tab| tab.is_visible = visible).await
    }

    /// Move a tab to `order_index`.
    pub async fn set_order(&self, id: &str, order_index: i64) -> Result<NavigationTabConfig, AppError> {
        self.modify(id, |tab| tab.order_index = order_index).await
    }

    /// Assign or clear a keyboard shortcut.
    pub async fn set_shortcut(
        &self,
        id: &str,
        shortcut: Option<String>,
    ) -> Result<NavigationTabConfig, AppError> {
        self.modify(id, |tab| tab.shortcut_key = shortcut).await
    }

    /// Lock or unlock a tab. Unlocking clears the stored hash.
    ///
    /// Only the gate state is stored here; verifying a password against
    /// `password_hash` is the UI's job.
    pub async fn set_lock(
        &self,
        id: &str,
        locked: bool,
        password_hash: Option<String>,
    ) -> Result<NavigationTabConfig, AppError> {
        if locked && password_hash.as_deref().is_none_or(str::is_empty) {
            return Err(AppError::validation("A locked tab needs a password hash"));
        }
        self.modify(id, |tab| {
            tab.is_locked = locked;
            tab.password_hash = if locked { password_hash } else { None };
        })
        .await
    }

    /// Delete every tab owned by `owner`. Used only by uninstall purge.
    pub async fn delete_for_owner(&self, owner: &str) -> Result<u64, AppError> {
        let mut cache = self.cache.write().await;
        let removed = self.repo.delete_by_owner(owner).await?;
        let prefix = format!("{owner}:");
        cache.retain(|id, _| !id.starts_with(&prefix));
        info!(owner = %owner, removed, "Navigation tabs purged");
        Ok(removed)
    }

    async fn modify<F>(&self, id: &str, apply: F) -> Result<NavigationTabConfig, AppError>
    where
        F: FnOnce(&mut NavigationTabConfig),
    {
        let mut cache = self.cache.write().await;
        let mut tab = match cache.get(id) {
            Some(tab) => tab.clone(),
            None => self.repo.get_or_insert_default(id).await?,
        };
        apply(&mut tab);
        self.repo.update(&tab).await?;
        cache.insert(id.to_string(), tab.clone());
        Ok(tab)
    }
}
