//! # sa-store-memory
//!
//! In-process implementation of `DocumentStore`.
//! Optionally behaves like a hosted document database that refuses ordered,
//! filtered queries until a matching composite index is declared.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sa_core::traits::{
    compare_values, DocRef, Document, DocumentStore, Direction, Fields, Query, StoreError,
    StoreResult,
};
use uuid::Uuid;

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// A declared composite index: equality fields plus the ordered field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
    collection: String,
    filter_fields: Vec<String>,
    order_field: String,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
    /// `None` means every query is allowed.
    indexes: Option<HashSet<IndexKey>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered queries with filters fail with `MissingIndex` unless declared
    /// through [`MemoryStore::with_index`].
    pub fn enforcing_indexes() -> Self {
        Self {
            collections: RwLock::default(),
            indexes: Some(HashSet::new()),
        }
    }

    pub fn with_index(mut self, collection: &str, filter_fields: &[&str], order_field: &str) -> Self {
        let mut fields: Vec<String> = filter_fields.iter().map(|f| f.to_string()).collect();
        fields.sort();
        self.indexes.get_or_insert_with(HashSet::new).insert(IndexKey {
            collection: collection.to_string(),
            filter_fields: fields,
            order_field: order_field.to_string(),
        });
        self
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }

    fn check_index(&self, query: &Query) -> StoreResult<()> {
        let (Some(indexes), Some(order)) = (&self.indexes, &query.order_by) else {
            return Ok(());
        };
        if query.filters.is_empty() {
            return Ok(());
        }
        let mut fields: Vec<String> = query.filters.iter().map(|(f, _)| f.clone()).collect();
        fields.sort();
        let key = IndexKey {
            collection: query.collection.clone(),
            filter_fields: fields,
            order_field: order.field.clone(),
        };
        if indexes.contains(&key) {
            Ok(())
        } else {
            Err(StoreError::MissingIndex {
                collection: query.collection.clone(),
            })
        }
    }
}

fn not_found(doc: &DocRef) -> StoreError {
    StoreError::NotFound {
        collection: doc.collection.clone(),
        id: doc.id.clone(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.check_index(query)?;
        let collections = self.read()?;
        let Some(records) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<Document> = records
            .iter()
            .filter(|(_, data)| query.matches(data))
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        if let Some(order) = &query.order_by {
            let null = serde_json::Value::Null;
            docs.sort_by(|a, b| {
                let ord = compare_values(
                    a.data.get(&order.field).unwrap_or(&null),
                    b.data.get(&order.field).unwrap_or(&null),
                );
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn get(&self, doc: &DocRef) -> StoreResult<Option<Document>> {
        let collections = self.read()?;
        Ok(collections
            .get(&doc.collection)
            .and_then(|records| records.get(&doc.id))
            .map(|data| Document {
                id: doc.id.clone(),
                data: data.clone(),
            }))
    }

    async fn create(&self, collection: &str, data: Fields) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        Ok(id)
    }

    async fn set(&self, doc: &DocRef, data: Fields) -> StoreResult<()> {
        let mut collections = self.write()?;
        let slot = collections
            .get_mut(&doc.collection)
            .and_then(|records| records.get_mut(&doc.id))
            .ok_or_else(|| not_found(doc))?;
        *slot = data;
        Ok(())
    }

    async fn update(&self, doc: &DocRef, fields: Fields) -> StoreResult<()> {
        let mut collections = self.write()?;
        let slot = collections
            .get_mut(&doc.collection)
            .and_then(|records| records.get_mut(&doc.id))
            .ok_or_else(|| not_found(doc))?;
        slot.extend(fields);
        Ok(())
    }

    /// Every reference is checked under the write lock before anything is
    /// applied, so a bad reference leaves the store untouched.
    async fn batch_update(&self, updates: Vec<(DocRef, Fields)>) -> StoreResult<()> {
        let mut collections = self.write()?;
        for (doc, _) in &updates {
            let exists = collections
                .get(&doc.collection)
                .is_some_and(|records| records.contains_key(&doc.id));
            if !exists {
                return Err(not_found(doc));
            }
        }
        for (doc, fields) in updates {
            if let Some(slot) = collections
                .get_mut(&doc.collection)
                .and_then(|records| records.get_mut(&doc.id))
            {
                slot.extend(fields);
            }
        }
        Ok(())
    }

    async fn delete(&self, doc: &DocRef) -> StoreResult<()> {
        let mut collections = self.write()?;
        collections
            .get_mut(&doc.collection)
            .and_then(|records| records.remove(&doc.id))
            .map(|_| ())
            .ok_or_else(|| not_found(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for (user, at) in [("u1", 3), ("u2", 9), ("u1", 7), ("u1", 1)] {
            store
                .create("notifications", fields(json!({ "userId": user, "createdAt": at })))
                .await
                .unwrap();
        }

        let q = Query::collection("notifications")
            .filter_eq("userId", "u1")
            .order_by("createdAt", Direction::Descending)
            .limit(2);
        let docs = store.query(&q).await.unwrap();
        let stamps: Vec<_> = docs.iter().map(|d| d.data["createdAt"].clone()).collect();
        assert_eq!(stamps, vec![json!(7), json!(3)]);
    }

    #[tokio::test]
    async fn enforcing_store_reports_missing_index() {
        let q = Query::collection("notifications")
            .filter_eq("userId", "u1")
            .order_by("createdAt", Direction::Descending);

        let strict = MemoryStore::enforcing_indexes();
        assert!(matches!(
            strict.query(&q).await,
            Err(StoreError::MissingIndex { .. })
        ));
        // Unordered queries never need an index.
        assert!(strict
            .query(&Query::collection("notifications").filter_eq("userId", "u1"))
            .await
            .is_ok());

        let indexed = MemoryStore::enforcing_indexes().with_index("notifications", &["userId"], "createdAt");
        assert!(indexed.query(&q).await.is_ok());
    }

    #[tokio::test]
    async fn batch_with_unknown_ref_changes_nothing() {
        let store = MemoryStore::new();
        let id = store
            .create("notifications", fields(json!({ "read": false })))
            .await
            .unwrap();

        let result = store
            .batch_update(vec![
                (DocRef::new("notifications", &id), fields(json!({ "read": true }))),
                (DocRef::new("notifications", "ghost"), fields(json!({ "read": true }))),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));

        let doc = store.get(&DocRef::new("notifications", &id)).await.unwrap().unwrap();
        assert_eq!(doc.data["read"], json!(false));
    }

    #[tokio::test]
    async fn set_replaces_and_update_merges() {
        let store = MemoryStore::new();
        let id = store
            .create("roles", fields(json!({ "name": "Foster", "legacy": true })))
            .await
            .unwrap();
        let doc = DocRef::new("roles", &id);

        store.set(&doc, fields(json!({ "name": "Foster Lead" }))).await.unwrap();
        store.update(&doc, fields(json!({ "color": "teal" }))).await.unwrap();

        let data = store.get(&doc).await.unwrap().unwrap().data;
        assert_eq!(data.get("legacy"), None);
        assert_eq!(data["name"], json!("Foster Lead"));
        assert_eq!(data["color"], json!("teal"));

        store.delete(&doc).await.unwrap();
        assert!(matches!(store.delete(&doc).await, Err(StoreError::NotFound { .. })));
    }
}
