use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::filter::Filter;
use super::schema::{Document, SchemaError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Cast to id failed for value \"{0}\"")]
    InvalidId(String),

    #[error("Duplicate value for unique field '{field}' in {collection}")]
    Duplicate { collection: String, field: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] SchemaError),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything a backend needs to know to host one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub unique_fields: Vec<String>,
}

impl CollectionSpec {
    pub fn validate_name(name: &str) -> StoreResult<()> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') || name.len() > 48 {
            return Err(StoreError::InvalidCollectionName(name.to_string()));
        }
        Ok(())
    }
}

/// Single-document persistence primitives. Documents arrive validated and stamped
/// by [`super::collection::Collection`]; backends only store, match, and enforce uniqueness.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Idempotently prepare storage (and unique indexes) for a collection.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()>;

    /// Matching documents in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    async fn find_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Document>>;

    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    /// Shallow-merge `patch` into the stored document and return the post-image.
    async fn update_by_id(&self, collection: &str, id: Uuid, patch: Document) -> StoreResult<Option<Document>>;

    /// Remove the document and return what was removed.
    async fn delete_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Document>>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }
}
