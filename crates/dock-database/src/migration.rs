//! Database migration runner.

use sqlx::SqlitePool;
use tracing::info;

use dock_core::error::{AppError, ErrorKind};

/// Run all pending database migrations.
///
/// Table creation uses `CREATE TABLE IF NOT EXISTS`, so running against a
/// database created by an older build is not an error.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    info!("Running database migrations...");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Database migrations completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabasePool;

    #[tokio::test]
    async fn test_migrations_are_rerunnable() {
        let db = DatabasePool::in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        run_migrations(db.pool()).await.unwrap();

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(db.pool())
                .await
                .unwrap();
        for expected in [
            "icon_blobs",
            "navigation_tabs",
            "plugin_data",
            "plugin_images",
            "plugin_records",
            "plugin_settings",
            "plugin_tool_statistics",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }
}
