//! Navigation tab repository.

use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::navigation::NavigationTabConfig;

/// Repository for navigation tab placement rows.
#[derive(Debug, Clone)]
pub struct NavigationTabRepository {
    pool: SqlitePool,
}

impl NavigationTabRepository {
    /// Create a new navigation tab repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a tab by id.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<NavigationTabConfig>> {
        sqlx::query_as::<_, NavigationTabConfig>("SELECT * FROM navigation_tabs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find tab", e))
    }

    /// List tabs in display order.
    pub async fn find_all(&self) -> AppResult<Vec<NavigationTabConfig>> {
        sqlx::query_as::<_, NavigationTabConfig>(
            "SELECT * FROM navigation_tabs ORDER BY order_index, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list tabs", e))
    }

    /// Create a default row (appended, visible, unlocked) unless one
    /// already exists, and return the stored row.
    pub async fn get_or_insert_default(&self, id: &str) -> AppResult<NavigationTabConfig> {
        sqlx::query(
            "INSERT INTO navigation_tabs \
                (id, order_index, is_visible, shortcut_key, is_locked, password_hash) \
             SELECT ?, COALESCE(MAX(order_index), -1) + 1, 1, NULL, 0, NULL \
             FROM navigation_tabs WHERE true \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create tab", e))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::database(format!("Tab '{id}' vanished after insert")))
    }

    /// Overwrite every mutable column of a tab.
    pub async fn update(&self, tab: &NavigationTabConfig) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE navigation_tabs SET order_index = ?, is_visible = ?, shortcut_key = ?, \
                is_locked = ?, password_hash = ? \
             WHERE id = ?",
        )
        .bind(tab.order_index)
        .bind(tab.is_visible)
        .bind(&tab.shortcut_key)
        .bind(tab.is_locked)
        .bind(&tab.password_hash)
        .bind(&tab.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update tab", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every tab whose id starts with `"{owner}:"`.
    pub async fn delete_by_owner(&self, owner: &str) -> AppResult<u64> {
        let prefix = format!("{owner}:");
        let result =
            sqlx::query("DELETE FROM navigation_tabs WHERE substr(id, 1, length(?)) = ?")
                .bind(&prefix)
                .bind(&prefix)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge tabs", e))?;
        Ok(result.rows_affected())
    }
}
