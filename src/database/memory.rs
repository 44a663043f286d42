//! In-memory document store.
//!
//! Not durable: state lives for the life of the process. Writes serialize behind one
//! `tokio::sync::RwLock`, which is also where unique fields are enforced, so uniqueness
//! holds even under concurrent inserts. Used by tests and by the binary when no
//! database URL is configured.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::filter::Filter;
use super::schema::Document;
use super::store::{CollectionSpec, DocumentStore, StoreError, StoreResult};

#[derive(Default)]
struct CollectionData {
    unique_fields: Vec<String>,
    docs: Vec<Document>,
}

impl CollectionData {
    fn position(&self, id: Uuid) -> Option<usize> {
        let id = id.to_string();
        self.docs
            .iter()
            .position(|doc| doc.get("id").and_then(Value::as_str) == Some(id.as_str()))
    }

    /// First unique field whose value in `candidate` is already held by another document.
    fn conflict(&self, candidate: &Document, skip: Option<usize>) -> Option<String> {
        self.unique_fields
            .iter()
            .find(|field| {
                let Some(value) = candidate.get(field.as_str()).filter(|v| !v.is_null()) else {
                    return false;
                };
                self.docs
                    .iter()
                    .enumerate()
                    .any(|(idx, doc)| Some(idx) != skip && doc.get(field.as_str()) == Some(value))
            })
            .cloned()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, CollectionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown(collection: &str) -> StoreError {
    StoreError::UnknownCollection(collection.to_string())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()> {
        CollectionSpec::validate_name(&spec.name)?;
        let mut collections = self.collections.write().await;
        let data = collections.entry(spec.name.clone()).or_default();
        for field in &spec.unique_fields {
            if !data.unique_fields.contains(field) {
                data.unique_fields.push(field.clone());
            }
        }
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let data = collections.get(collection).ok_or_else(|| unknown(collection))?;
        Ok(data.docs.iter().filter(|doc| filter.matches(doc)).cloned().collect())
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        let data = collections.get(collection).ok_or_else(|| unknown(collection))?;
        Ok(data.position(id).map(|idx| data.docs[idx].clone()))
    }

    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;
        if let Some(field) = data.conflict(&doc, None) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                field,
            });
        }
        data.docs.push(doc.clone());
        Ok(doc)
    }

    async fn update_by_id(&self, collection: &str, id: Uuid, patch: Document) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;
        let Some(idx) = data.position(id) else {
            return Ok(None);
        };

        let mut updated = data.docs[idx].clone();
        updated.extend(patch);
        if let Some(field) = data.conflict(&updated, Some(idx)) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                field,
            });
        }
        data.docs[idx] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Document>> {
        let mut collections = self.collections.write().await;
        let data = collections.get_mut(collection).ok_or_else(|| unknown(collection))?;
        Ok(data.position(id).map(|idx| data.docs.remove(idx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with_id(id: Uuid, body: Value) -> Document {
        let mut doc = body.as_object().cloned().unwrap();
        doc.insert("id".into(), json!(id.to_string()));
        doc
    }

    async fn store_with_users() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .ensure_collection(&CollectionSpec {
                name: "users".into(),
                unique_fields: vec!["username".into()],
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn unknown_collection_is_an_error() {
        let store = MemoryStore::new();
        let err = store.find("ghosts", &Filter::all()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownCollection(_)));
    }

    #[tokio::test]
    async fn insert_enforces_unique_fields() {
        let store = store_with_users().await;
        store
            .insert("users", doc_with_id(Uuid::new_v4(), json!({"username": "ann"})))
            .await
            .unwrap();
        let err = store
            .insert("users", doc_with_id(Uuid::new_v4(), json!({"username": "ann"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "username"));
    }

    #[tokio::test]
    async fn update_merges_and_keeps_uniqueness() {
        let store = store_with_users().await;
        let ann = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.insert("users", doc_with_id(ann, json!({"username": "ann", "age": 3}))).await.unwrap();
        store.insert("users", doc_with_id(bob, json!({"username": "bob"}))).await.unwrap();

        let updated = store
            .update_by_id("users", ann, json!({"age": 4}).as_object().cloned().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("username"), Some(&json!("ann")));
        assert_eq!(updated.get("age"), Some(&json!(4)));

        // renaming ann onto bob must fail and leave ann untouched
        let err = store
            .update_by_id("users", ann, json!({"username": "bob"}).as_object().cloned().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        let ann_doc = store.find_by_id("users", ann).await.unwrap().unwrap();
        assert_eq!(ann_doc.get("username"), Some(&json!("ann")));

        // re-saving the same unique value on the same document is fine
        assert!(store
            .update_by_id("users", ann, json!({"username": "ann"}).as_object().cloned().unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn delete_returns_removed_document() {
        let store = store_with_users().await;
        let id = Uuid::new_v4();
        store.insert("users", doc_with_id(id, json!({"username": "ann"}))).await.unwrap();

        let removed = store.delete_by_id("users", id).await.unwrap();
        assert_eq!(removed.unwrap().get("username"), Some(&json!("ann")));
        assert!(store.delete_by_id("users", id).await.unwrap().is_none());
        assert!(store.find("users", &Filter::all()).await.unwrap().is_empty());
    }
}
