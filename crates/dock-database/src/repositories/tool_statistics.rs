//! Tool statistics repository.

use chrono::Utc;
use sqlx::SqlitePool;

use dock_core::error::{AppError, ErrorKind};
use dock_core::result::AppResult;
use dock_entity::tool::ToolStatistics;

/// Repository for per-tool call statistics.
#[derive(Debug, Clone)]
pub struct ToolStatisticsRepository {
    pool: SqlitePool,
}

impl ToolStatisticsRepository {
    /// Create a new tool statistics repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one call. Counters and the running average are updated in a
    /// single upsert.
    pub async fn record_call(
        &self,
        plugin_name: &str,
        tool_name: &str,
        success: bool,
        duration_ms: f64,
    ) -> AppResult<()> {
        let now = Utc::now();
        let (ok, failed) = if success { (1i64, 0i64) } else { (0, 1) };
        sqlx::query(
            "INSERT INTO plugin_tool_statistics \
                (id, plugin_name, tool_name, call_count, success_count, failure_count, \
                 average_duration_ms, first_call_at, last_call_at, created_at, updated_at) \
             VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
                call_count = plugin_tool_statistics.call_count + 1, \
                success_count = plugin_tool_statistics.success_count + excluded.success_count, \
                failure_count = plugin_tool_statistics.failure_count + excluded.failure_count, \
                average_duration_ms = (plugin_tool_statistics.average_duration_ms \
                    * plugin_tool_statistics.call_count + excluded.average_duration_ms) \
                    / (plugin_tool_statistics.call_count + 1), \
                last_call_at = excluded.last_call_at, \
                updated_at = excluded.updated_at",
        )
        .bind(format!("{plugin_name}:{tool_name}"))
        .bind(plugin_name)
        .bind(tool_name)
        .bind(ok)
        .bind(failed)
        .bind(duration_ms)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record tool statistics", e)
        })?;
        Ok(())
    }

    /// Statistics of one tool.
    pub async fn find(&self, plugin_name: &str, tool_name: &str) -> AppResult<Option<ToolStatistics>> {
        sqlx::query_as::<_, ToolStatistics>("SELECT * FROM plugin_tool_statistics WHERE id = ?")
            .bind(format!("{plugin_name}:{tool_name}"))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to read tool statistics", e)
            })
    }

    /// Statistics of every tool of a plugin.
    pub async fn find_by_plugin(&self, plugin_name: &str) -> AppResult<Vec<ToolStatistics>> {
        sqlx::query_as::<_, ToolStatistics>(
            "SELECT * FROM plugin_tool_statistics WHERE plugin_name = ? ORDER BY tool_name",
        )
        .bind(plugin_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list tool statistics", e))
    }

    /// Delete every statistics row of a plugin.
    pub async fn delete_by_plugin(&self, plugin_name: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM plugin_tool_statistics WHERE plugin_name = ?")
            .bind(plugin_name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge tool statistics", e)
            })?;
        Ok(result.rows_affected())
    }
}
