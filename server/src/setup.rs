use std::sync::Arc;

use anyhow::{Context, Result};
use shopfloor_core::executor::TransitionExecutor;
use shopfloor_db::SqliteStorage;
use tracing::info;

use crate::config::Config;
use crate::permission::StaticRoleOracle;
use crate::routes::{build_router, AppState};

/// Open the SQLite backend described by the config and run its migrations.
pub async fn create_storage(config: &Config) -> Result<SqliteStorage> {
    let database_url = config.database_url();
    info!("Opening storage at: {}", database_url);

    let storage = SqliteStorage::new(&database_url)
        .await
        .context("Failed to open SQLite storage")?;

    info!("Running database migrations");
    storage
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    Ok(storage)
}

/// Build the axum router wired to a `TransitionExecutor` over the given
/// storage and a default `PermissionOracle`.
pub fn build_app(storage: SqliteStorage) -> axum::Router {
    let state = Arc::new(AppState {
        executor: TransitionExecutor::new(storage),
        permissions: Arc::new(StaticRoleOracle),
    });
    build_router(state)
}

/// Initialize the complete application: open storage, run migrations, wire
/// the router.
pub async fn initialize_app(config: &Config) -> Result<axum::Router> {
    let storage = create_storage(config)
        .await
        .context("Failed to create storage")?;
    Ok(build_app(storage))
}

/// Ensure the parent directory of the configured database file exists.
pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_url())
}

pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.exists() {
                info!("Creating database directory: {}", parent.display());
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, LogFormat, LoggingConfig, ServerConfig};
    use tempfile::TempDir;

    fn config_with_url(url: String) -> Config {
        Config {
            database: DatabaseConfig {
                url: Some(url),
                max_connections: 5,
                connection_timeout: 30,
            },
            server: ServerConfig {
                listen_addr: "127.0.0.1".to_string(),
                port: 3000,
                workers: 4,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }

    #[tokio::test]
    async fn test_create_storage_with_custom_url() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let storage = create_storage(&config_with_url(database_url)).await;
        assert!(storage.is_ok());
    }

    #[tokio::test]
    async fn test_create_storage_invalid_url() {
        let storage = create_storage(&config_with_url("postgres://invalid".to_string())).await;
        assert!(storage.is_err());
    }

    #[test]
    fn test_ensure_database_directory() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("subdir").join("test.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let result = ensure_database_directory(&database_url);
        assert!(result.is_ok());
        assert!(db_path.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_initialize_app_builds_a_router() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("app_test.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let app = initialize_app(&config_with_url(database_url)).await;
        assert!(app.is_ok());
    }
}
