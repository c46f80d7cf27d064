//! services/api/src/adapters/kv_store.rs
//!
//! The durable key-value adapter, the concrete implementation of the
//! `KeyValueStore` port. Each key maps to one JSON text value in a single
//! SQLite table, the same shape the app kept in browser local storage.

use async_trait::async_trait;
use lumina_core::ports::{KeyValueStore, PortError, PortResult};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A key-value adapter backed by SQLite.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn storage_error(e: sqlx::Error) -> PortError {
    PortError::Unexpected(format!("storage failure: {}", e))
}

//=========================================================================================
// `KeyValueStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM collections WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        debug!("Writing {} bytes to '{}'", value.len(), key);
        sqlx::query(
            "INSERT INTO collections (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM collections WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}
