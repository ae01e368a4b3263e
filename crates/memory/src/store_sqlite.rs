/// SQLite-backed key-value store.
use std::collections::HashMap;

use {
    async_trait::async_trait,
    serde_json::Value,
    sqlx::SqlitePool,
};

use crate::store::KvStore;

pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Wrap an existing pool. Call [`SqliteKvStore::init`] first on a fresh
    /// database.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the backing table if it does not exist yet.
    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, keys: &[&str]) -> anyhow::Result<HashMap<String, Value>> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            if let Some((raw,)) = row {
                out.insert((*key).to_string(), serde_json::from_str(&raw)?);
            }
        }
        Ok(out)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> anyhow::Result<()> {
        // One transaction per call keeps the multi-key snapshot atomic.
        let mut tx = self.pool.begin().await?;
        for (key, value) in &entries {
            sqlx::query(
                "INSERT INTO kv (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
