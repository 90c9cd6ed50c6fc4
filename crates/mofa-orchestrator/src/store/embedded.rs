//! Embedded single-file key/value store (default backend).
//!
//! SQLite with write-ahead logging enabled, accessed through `sqlx`.
//! Grounded on `mofa-foundation::persistence::sqlite::SqliteStore`'s
//! connect/migrate pattern, narrowed to a single `(namespace, key, value)`
//! table rather than the LLM-chat schema. A single writer at a time per
//! file is enforced by SQLite itself under WAL; concurrent readers are
//! permitted.

use super::{Namespace, Store, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

fn encode_namespace(ns: &Namespace) -> String {
    // '\u{1f}' (unit separator) cannot appear in namespace segments supplied
    // by this crate (they are fixed identifiers like "memory" or a uuid),
    // so it is safe as a join delimiter.
    ns.join("\u{1f}")
}

pub struct EmbeddedStore {
    pool: SqlitePool,
}

impl EmbeddedStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_record (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }
}

#[async_trait]
impl Store for EmbeddedStore {
    async fn get(&self, ns: &Namespace, key: &str) -> StoreResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM store_record WHERE namespace = ? AND key = ?")
            .bind(encode_namespace(ns))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row.get("value");
                let value = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, ns: &Namespace, key: &str, value: Value) -> StoreResult<()> {
        let raw = serde_json::to_string(&value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO store_record (namespace, key, value) VALUES (?, ?, ?)
            ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(encode_namespace(ns))
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, ns: &Namespace) -> StoreResult<Vec<(String, Value)>> {
        let rows = sqlx::query("SELECT key, value FROM store_record WHERE namespace = ? ORDER BY key")
            .bind(encode_namespace(ns))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let key: String = row.get("key");
                let raw: String = row.get("value");
                let value = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok((key, value))
            })
            .collect()
    }

    async fn delete(&self, ns: &Namespace, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM store_record WHERE namespace = ? AND key = ?")
            .bind(encode_namespace(ns))
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
