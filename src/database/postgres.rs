//! PostgreSQL document store.
//!
//! Each collection is a table of JSONB documents:
//! `(seq BIGSERIAL, id UUID PRIMARY KEY, doc JSONB NOT NULL)`. Each filter condition
//! compiles to a JSONB equality on one top-level field, with a missing field read as
//! `null`, matching [`Filter::matches`]. Updates are a shallow merge (`doc || $2`), and
//! unique fields get unique expression indexes named `<collection>__<field>__unique`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::filter::Filter;
use super::schema::Document;
use super::store::{CollectionSpec, DocumentStore, StoreError, StoreResult};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn unique_index_name(collection: &str, field: &str) -> String {
        format!("{}__{}__unique", collection, field)
    }

    fn map_write_error(collection: &str, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let field = db
                    .constraint()
                    .map(|name| {
                        name.strip_prefix(&format!("{}__", collection))
                            .and_then(|rest| rest.strip_suffix("__unique"))
                            .unwrap_or(name)
                            .to_string()
                    })
                    .unwrap_or_else(|| "id".to_string());
                return StoreError::Duplicate {
                    collection: collection.to_string(),
                    field,
                };
            }
        }
        StoreError::Sqlx(err)
    }
}

fn document_id(doc: &Document) -> StoreResult<Uuid> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StoreError::QueryError("document is missing a valid id".to_string()))
}

/// WHERE predicate for `filter`. Binds go field name then expected value, for each
/// condition in `filter.conditions()` order.
fn filter_sql(filter: &Filter) -> String {
    if filter.is_empty() {
        return "TRUE".to_string();
    }
    (0..filter.conditions().len())
        .map(|i| {
            format!(
                "COALESCE(doc -> ${}::text, 'null'::jsonb) = ${}::jsonb",
                2 * i + 1,
                2 * i + 2
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()> {
        CollectionSpec::validate_name(&spec.name)?;

        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (seq BIGSERIAL, id UUID PRIMARY KEY, doc JSONB NOT NULL)",
            spec.name
        );
        sqlx::query(&create_table).execute(&self.pool).await?;

        for field in &spec.unique_fields {
            // field names end up inside a SQL literal, hold them to the same rules as tables
            CollectionSpec::validate_name(field)
                .map_err(|_| StoreError::QueryError(format!("Invalid unique field name: {}", field)))?;
            let create_index = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{}\" ON \"{}\" ((doc->>'{}'))",
                Self::unique_index_name(&spec.name, field),
                spec.name,
                field
            );
            sqlx::query(&create_index).execute(&self.pool).await?;
        }

        debug!("Collection ready: {}", spec.name);
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        CollectionSpec::validate_name(collection)?;
        let sql = format!(
            "SELECT doc FROM \"{}\" WHERE {} ORDER BY seq",
            collection,
            filter_sql(filter)
        );
        let mut query = sqlx::query_scalar::<_, Json<Document>>(&sql);
        for (field, expected) in filter.conditions() {
            query = query.bind(field.as_str()).bind(Json(expected));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Document>> {
        CollectionSpec::validate_name(collection)?;
        let sql = format!("SELECT doc FROM \"{}\" WHERE id = $1", collection);
        let row: Option<Json<Document>> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<Document> {
        CollectionSpec::validate_name(collection)?;
        let id = document_id(&doc)?;
        let sql = format!("INSERT INTO \"{}\" (id, doc) VALUES ($1, $2) RETURNING doc", collection);
        let Json(stored): Json<Document> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(Json(&doc))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;
        Ok(stored)
    }

    async fn update_by_id(&self, collection: &str, id: Uuid, patch: Document) -> StoreResult<Option<Document>> {
        CollectionSpec::validate_name(collection)?;
        let sql = format!("UPDATE \"{}\" SET doc = doc || $2 WHERE id = $1 RETURNING doc", collection);
        let row: Option<Json<Document>> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(Json(&patch))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(collection, e))?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn delete_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Document>> {
        CollectionSpec::validate_name(collection)?;
        let sql = format!("DELETE FROM \"{}\" WHERE id = $1 RETURNING doc", collection);
        let row: Option<Json<Document>> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(doc)| doc))
    }
}
