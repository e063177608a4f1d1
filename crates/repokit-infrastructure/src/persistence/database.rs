use std::str::FromStr;
use std::time::Duration;

use repokit_domain::DomainError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use super::error_mapper::ResultExt;
use crate::config::StoreConfig;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &StoreConfig) -> Result<Self, DomainError> {
        config.validate()?;

        if let Some(path) = config.file_path() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DomainError::Configuration(format!("Failed to create DB directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_repo_error("Parse database URL")?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(config.foreign_keys)
            .busy_timeout(config.busy_timeout());

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout());

        // Each connection to `:memory:` is its own database; keep exactly one
        // alive for the pool's lifetime
        if config.is_in_memory() {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_repo_error("Open database")?;

        info!(
            target: "repokit::persistence",
            url = %config.database_url,
            in_memory = config.is_in_memory(),
            "Database connected"
        );

        Ok(Self { pool })
    }

    /// Run caller-supplied schema SQL (may hold several statements)
    pub async fn execute_script(&self, sql: &str) -> Result<(), DomainError> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_repo_error("Execute script")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }
}
