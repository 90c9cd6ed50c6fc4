//! Relational backend (opt-in, `persistence-postgres` feature) for
//! persistent user memory (spec §4.3, §6 "Store schema").
//!
//! Schema lives under the `memory` Postgres schema:
//! `nodes(user_id, node_id, context_type, content JSONB, summary,
//! created_at, updated_at)` with two unique indexes: a partial one on
//! `(user_id, entity_id, entity_system)` extracted from `content` for
//! entity deduplication (only covers rows whose `content` carries those
//! keys), and a plain one on `(user_id, context_type)` for the single
//! `SimpleMemory` document per user the memory subsystem reads/writes
//! through [`Store::get`]/[`Store::put`] (spec §4.6 "Persistence") — that
//! document's top-level JSON has no `entity_id` key, so it never matches
//! the partial index's predicate.

use super::{Namespace, Store, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub struct RelationalStore {
    pool: PgPool,
}

impl RelationalStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query("CREATE SCHEMA IF NOT EXISTS memory")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory.nodes (
                user_id TEXT NOT NULL,
                node_id UUID PRIMARY KEY,
                context_type TEXT NOT NULL,
                content JSONB NOT NULL,
                summary TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS nodes_entity_dedup
            ON memory.nodes (user_id, (content->>'entity_id'), (content->>'entity_system'))
            WHERE content->>'entity_id' IS NOT NULL
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS nodes_user_context_dedup
            ON memory.nodes (user_id, context_type)
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// `(namespace, key)` collapses onto `(user_id=ns[1], context_type=key)`
    /// for the single-row-per-user "SimpleMemory" record the memory
    /// subsystem writes (spec §4.6 "Persistence").
    fn user_id(ns: &Namespace) -> StoreResult<&str> {
        ns.get(1)
            .map(String::as_str)
            .ok_or_else(|| StoreError::Query("namespace missing user_id segment".into()))
    }
}

#[async_trait]
impl Store for RelationalStore {
    async fn get(&self, ns: &Namespace, key: &str) -> StoreResult<Option<Value>> {
        let user_id = Self::user_id(ns)?;
        let row = sqlx::query(
            "SELECT content FROM memory.nodes WHERE user_id = $1 AND context_type = $2 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(row.map(|r| r.get::<Value, _>("content")))
    }

    async fn put(&self, ns: &Namespace, key: &str, value: Value) -> StoreResult<()> {
        let user_id = Self::user_id(ns)?;
        sqlx::query(
            r#"
            INSERT INTO memory.nodes (user_id, node_id, context_type, content, updated_at)
            VALUES ($1, gen_random_uuid(), $2, $3, now())
            ON CONFLICT (user_id, context_type)
            DO UPDATE SET content = excluded.content, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(key)
        .bind(&value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, ns: &Namespace) -> StoreResult<Vec<(String, Value)>> {
        let user_id = Self::user_id(ns)?;
        let rows = sqlx::query(
            "SELECT context_type, content FROM memory.nodes WHERE user_id = $1 ORDER BY context_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("context_type"), r.get::<Value, _>("content")))
            .collect())
    }

    async fn delete(&self, ns: &Namespace, key: &str) -> StoreResult<bool> {
        let user_id = Self::user_id(ns)?;
        let result = sqlx::query("DELETE FROM memory.nodes WHERE user_id = $1 AND context_type = $2")
            .bind(user_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
