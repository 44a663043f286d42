use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::filter::Filter;
use super::schema::{Document, Schema, SchemaOptions};
use super::store::{CollectionSpec, DocumentStore, StoreError, StoreResult};

/// Persistence handle for one resource.
///
/// Validates input against the schema, assigns ids, and stamps timestamps before
/// delegating to the backing [`DocumentStore`]. Cheap to clone and shared by every
/// request for the resource.
#[derive(Clone)]
pub struct Collection {
    name: Arc<str>,
    schema: Arc<Schema>,
    options: SchemaOptions,
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Register the collection with the store and return its handle.
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        name: impl Into<String>,
        schema: Schema,
        options: SchemaOptions,
    ) -> StoreResult<Self> {
        let name = name.into();
        CollectionSpec::validate_name(&name)?;
        let spec = CollectionSpec {
            name: name.clone(),
            unique_fields: schema.unique_fields(),
        };
        store.ensure_collection(&spec).await?;

        Ok(Self {
            name: name.into(),
            schema: Arc::new(schema),
            options,
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.store.find(&self.name, filter).await
    }

    pub async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        self.store.find_one(&self.name, filter).await
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        self.store.find_by_id(&self.name, parse_id(id)?).await
    }

    pub async fn create(&self, doc: Document) -> StoreResult<Document> {
        let mut doc = self.schema.prepare_create(doc, &self.options)?;
        doc.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        if self.options.timestamps {
            let now = timestamp();
            doc.insert("created_at".into(), now.clone());
            doc.insert("updated_at".into(), now);
        }
        self.store.insert(&self.name, doc).await
    }

    /// Apply `patch` and return the updated document, or `None` when `id` does not exist.
    pub async fn update_by_id(&self, id: &str, patch: Document) -> StoreResult<Option<Document>> {
        let id = parse_id(id)?;
        let mut patch = self.schema.prepare_patch(patch, &self.options)?;
        if self.options.timestamps {
            patch.insert("updated_at".into(), timestamp());
        }
        self.store.update_by_id(&self.name, id, patch).await
    }

    pub async fn delete_by_id(&self, id: &str) -> StoreResult<Option<Document>> {
        self.store.delete_by_id(&self.name, parse_id(id)?).await
    }
}

fn parse_id(id: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}
