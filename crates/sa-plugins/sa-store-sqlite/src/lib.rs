//! # sa-store-sqlite Implementation
//!
//! This module maps the `sa-core` document model onto a single SQLite table.
//! Each record is one JSON text column; filters and ordering go through
//! `json_extract`, so no composite index is ever required.

use std::str::FromStr;

use async_trait::async_trait;
use sa_core::traits::{
    DocRef, Document, DocumentStore, Direction, Fields, Query, StoreError, StoreResult,
};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    data       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Connects (creating the file if needed) and ensures the schema exists.
    ///
    /// # Developer Note
    /// Every pooled connection to `sqlite::memory:` would get its own empty
    /// database, so in-memory URLs are pinned to a single connection that is
    /// never reaped; closing it would drop the whole database.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = pool_options(url).connect_with(options).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        log::info!("sqlite document store ready at {url}");
        Ok(Self { pool })
    }
}

fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

fn backend(err: impl Into<anyhow::Error>) -> StoreError {
    StoreError::Backend(err.into())
}

fn not_found(doc: &DocRef) -> StoreError {
    StoreError::NotFound {
        collection: doc.collection.clone(),
        id: doc.id.clone(),
    }
}

/// JSON path for a top-level field, quoted so any key is safe.
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\""))
}

fn parse_body(raw: &str) -> StoreResult<Fields> {
    match serde_json::from_str::<Value>(raw).map_err(backend)? {
        Value::Object(map) => Ok(map),
        _ => Err(backend(anyhow::anyhow!("stored document is not a JSON object"))),
    }
}

/// SQL-side value a filter compares `json_extract` output against.
enum Param {
    Text(String),
    Int(i64),
    Real(f64),
}

fn filter_param(value: &Value) -> Option<Param> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Param::Int(i64::from(*b))),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => Param::Int(i),
            None => Param::Real(n.as_f64().unwrap_or_default()),
        }),
        Value::String(s) => Some(Param::Text(s.clone())),
        other => Some(Param::Text(other.to_string())),
    }
}

/// Read-merge-write of one record on an open connection/transaction.
async fn merge_into(conn: &mut SqliteConnection, doc: &DocRef, fields: Fields) -> StoreResult<()> {
    let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
        .bind(doc.collection.as_str())
        .bind(doc.id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;
    let Some(row) = row else {
        return Err(not_found(doc));
    };

    let mut data = parse_body(&row.try_get::<String, _>("data").map_err(backend)?)?;
    data.extend(fields);

    sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
        .bind(Value::Object(data).to_string())
        .bind(doc.collection.as_str())
        .bind(doc.id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(backend)?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut params = Vec::new();
        for (field, value) in &query.filters {
            params.push(Param::Text(json_path(field)));
            match filter_param(value) {
                Some(param) => {
                    sql.push_str(" AND json_extract(data, ?) = ?");
                    params.push(param);
                }
                None => sql.push_str(" AND json_extract(data, ?) IS NULL"),
            }
        }
        if let Some(order) = &query.order_by {
            let dir = match order.direction {
                Direction::Ascending => "ASC",
                Direction::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY json_extract(data, ?) {dir}, id {dir}"));
            params.push(Param::Text(json_path(&order.field)));
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(Param::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = sqlx::query(&sql).bind(query.collection.as_str());
        for param in params {
            stmt = match param {
                Param::Text(s) => stmt.bind(s),
                Param::Int(i) => stmt.bind(i),
                Param::Real(f) => stmt.bind(f),
            };
        }

        let rows = stmt.fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(backend)?;
                let data = parse_body(&row.try_get::<String, _>("data").map_err(backend)?)?;
                Ok(Document { id, data })
            })
            .collect()
    }

    async fn get(&self, doc: &DocRef) -> StoreResult<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(doc.collection.as_str())
            .bind(doc.id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(Document {
                id: doc.id.clone(),
                data: parse_body(&row.try_get::<String, _>("data").map_err(backend)?)?,
            })),
            None => Ok(None),
        }
    }

    async fn create(&self, collection: &str, data: Fields) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id.as_str())
            .bind(Value::Object(data).to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(id)
    }

    async fn set(&self, doc: &DocRef, data: Fields) -> StoreResult<()> {
        let result = sqlx::query("UPDATE documents SET data = ? WHERE collection = ? AND id = ?")
            .bind(Value::Object(data).to_string())
            .bind(doc.collection.as_str())
            .bind(doc.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(not_found(doc));
        }
        Ok(())
    }

    async fn update(&self, doc: &DocRef, fields: Fields) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        merge_into(&mut tx, doc, fields).await?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    /// One transaction for the whole batch; an error drops `tx`, which
    /// rolls back every earlier write in the batch.
    async fn batch_update(&self, updates: Vec<(DocRef, Fields)>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for (doc, fields) in updates {
            merge_into(&mut tx, &doc, fields).await?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(doc.collection.as_str())
            .bind(doc.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(not_found(doc));
        }
        Ok(())
    }
}
