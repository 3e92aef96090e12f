//! Dock host: desktop plugin runtime.
//!
//! Main entry point that wires all crates together, applies deferred
//! plugin operations, loads plugins and runs until shutdown.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use dock_core::config::AppConfig;
use dock_core::error::AppError;
use dock_database::DatabasePool;
use dock_plugin::{DockContext, DynamicLibraryLoader};

#[tokio::main]
async fn main() {
    let env = std::env::var("DOCK_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Host error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main host run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting dock host v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Create data directories ──────────────────────────
    let dirs = [
        Some(config.plugins.plugin_root()),
        Some(config.plugins.staging_root()),
        config.database.parent_directory(),
    ];
    for dir in dirs.into_iter().flatten() {
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::storage(format!("Failed to create dir '{}': {e}", dir.display()))
        })?;
    }

    // ── Step 2: Database connection + migrations ─────────────────
    let db = DatabasePool::connect(&config.database).await?;
    dock_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    // ── Step 3: Wire stores and the plugin manager ───────────────
    let context = DockContext::new(config, db.clone(), Arc::new(DynamicLibraryLoader::new()));

    // ── Step 4: Apply pending operations, then load plugins ──────
    context.manager.startup().await?;
    for plugin in context.manager.list_plugins().await? {
        match &plugin.error_message {
            Some(error) => tracing::warn!(
                plugin = %plugin.unique_name,
                version = %plugin.version,
                error = %error,
                "Plugin failed to load"
            ),
            None => tracing::info!(
                plugin = %plugin.unique_name,
                version = %plugin.version,
                state = %plugin.state,
                "Plugin ready"
            ),
        }
    }

    // ── Step 5: Wait for shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    // ── Step 6: Unload plugins and close the database ────────────
    context.manager.shutdown().await;
    db.close().await;

    tracing::info!("Dock host shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
