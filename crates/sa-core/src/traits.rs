//! # Core Traits (Ports)
//!
//! Any storage plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field map used for partial updates and document bodies.
pub type Fields = Map<String, Value>;

/// Failure reported by a storage plugin.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An ordered/filtered query needs a composite index the backend does not have.
    #[error("query on '{collection}' requires a missing index")]
    MissingIndex { collection: String },

    #[error("document {collection}/{id} does not exist")]
    NotFound { collection: String, id: String },

    /// Anything else the backend raised (connection lost, bad JSON, ...)
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Address of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// A stored record. `data` never contains the id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality-filtered, optionally ordered and limited collection query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when every filter matches the given document body.
    pub fn matches(&self, data: &Fields) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| data.get(field).unwrap_or(&Value::Null) == expected)
    }
}

/// Data persistence contract for roles, users and notifications.
///
/// # Developer Note
/// `batch_update` must be all-or-nothing: if any reference is missing or a
/// write fails, no document in the batch may be left modified.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;
    async fn get(&self, doc: &DocRef) -> StoreResult<Option<Document>>;

    /// Inserts a new record and returns its generated id.
    async fn create(&self, collection: &str, data: Fields) -> StoreResult<String>;
    /// Replaces the whole body of an existing record.
    async fn set(&self, doc: &DocRef, data: Fields) -> StoreResult<()>;
    /// Merges `fields` into an existing record.
    async fn update(&self, doc: &DocRef, fields: Fields) -> StoreResult<()>;
    async fn batch_update(&self, updates: Vec<(DocRef, Fields)>) -> StoreResult<()>;
    async fn delete(&self, doc: &DocRef) -> StoreResult<()>;
}

/// Shared helper for adapters: compare two JSON scalars for ordering.
/// Numbers compare numerically, strings lexically, null sorts first.
pub fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
