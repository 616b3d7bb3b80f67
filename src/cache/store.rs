use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

/// Persistent cache tier backed by sqlite. One row per cache key,
/// INSERT OR REPLACE semantics so concurrent writers resolve to
/// last-writer-wins per key. Expired rows are kept until overwritten or
/// invalidated; readers decide freshness against `expires_at`.
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    pub async fn new(database_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_string = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            format!("sqlite://{}?mode=rwc", database_path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// In-memory database for tests and ephemeral runs. Pinned to a single
    /// connection: every pooled sqlite `:memory:` connection would otherwise
    /// see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                payload TEXT NOT NULL,
                stored_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cache_provider ON cache_entries(provider)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Unexpired payload plus its expiry, for repopulating the memory tier.
    pub async fn get_fresh(&self, key: &str) -> Result<Option<(Value, DateTime<Utc>)>> {
        let row = sqlx::query(
            "SELECT payload, expires_at FROM cache_entries WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                let expires_at: i64 = row.get("expires_at");
                let value: Value = serde_json::from_str(&payload)?;
                let expires_at = Utc
                    .timestamp_opt(expires_at, 0)
                    .single()
                    .unwrap_or_else(Utc::now);
                Ok(Some((value, expires_at)))
            }
            None => Ok(None),
        }
    }

    /// Payload regardless of expiry, for stale-serve fallback.
    pub async fn get_stale(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT payload FROM cache_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    pub async fn put(
        &self,
        key: &str,
        provider: &str,
        payload: &Value,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache_entries (key, provider, payload, stored_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(key)
        .bind(provider)
        .bind(serde_json::to_string(payload)?)
        .bind(Utc::now().timestamp())
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_provider(&self, provider: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE provider = ?")
            .bind(provider)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
