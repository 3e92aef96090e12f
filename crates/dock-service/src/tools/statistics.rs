//! Tool statistics store.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use dock_core::error::AppError;
use dock_database::repositories::ToolStatisticsRepository;
use dock_entity::tool::ToolStatistics;

/// Per-tool call counters and timing.
#[derive(Debug, Clone)]
pub struct ToolStatisticsStore {
    repo: Arc<ToolStatisticsRepository>,
}

impl ToolStatisticsStore {
    /// Creates a new statistics store.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: Arc::new(ToolStatisticsRepository::new(pool)),
        }
    }

    /// Record one call.
    pub async fn record(
        &self,
        plugin_name: &str,
        tool_name: &str,
        success: bool,
        elapsed: Duration,
    ) -> Result<(), AppError> {
        self.repo
            .record_call(plugin_name, tool_name, success, elapsed.as_secs_f64() * 1000.0)
            .await
    }

    /// Statistics of one tool.
    pub async fn get(&self, plugin_name: &str, tool_name: &str) -> Result<Option<ToolStatistics>, AppError> {
        self.repo.find(plugin_name, tool_name).await
    }

    /// Statistics of every tool of a plugin.
    pub async fn list_for_plugin(&self, plugin_name: &str) -> Result<Vec<ToolStatistics>, AppError> {
        self.repo.find_by_plugin(plugin_name).await
    }

    /// Delete every statistics row of a plugin.
    pub async fn delete_all(&self, plugin_name: &str) -> Result<u64, AppError> {
        self.repo.delete_by_plugin(plugin_name).await
    }
}
