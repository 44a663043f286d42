//! REST resources: one collection plus a router exposing list/show/create/update/destroy.
//!
//! Routes, relative to wherever the router is nested:
//!
//! | Method | Path   | Operation |
//! |--------|--------|-----------|
//! | GET    | `/`    | index     |
//! | POST   | `/`    | create    |
//! | GET    | `/:id` | show      |
//! | PUT    | `/:id` | update    |
//! | DELETE | `/:id` | destroy   |

pub mod config;
mod handlers;

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::database::{Collection, DocumentStore, Filter, Schema, StoreResult};
use crate::error::ApiError;
use crate::middleware::apply_chain;

pub use config::ResourceConfig;
pub(crate) use handlers::caller_username;
use handlers::ResourceState;

pub const ITEM_MISSING: &str = "Item Doesn't exist";
pub const NOT_OWNER: &str = "NOT THIS USERS ITEM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Index,
    Show,
    Create,
    Update,
    Destroy,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Index,
        Operation::Show,
        Operation::Create,
        Operation::Update,
        Operation::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Show => "show",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request filter for the default list handler.
pub type IndexQuery = Arc<dyn Fn(&Request) -> Result<Filter, ApiError> + Send + Sync>;

/// Caller-supplied replacement for a default operation. Receives the raw request and
/// the resource's collection and owns the whole response.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(Request, Collection) -> BoxFuture<'static, Response> + Send + Sync>);

impl Handler {
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Collection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self(Arc::new(move |request: Request, collection: Collection| -> BoxFuture<'static, Response> {
            let fut = f(request, collection);
            Box::pin(async move { fut.await.into_response() })
        }))
    }

    pub fn call(&self, request: Request, collection: Collection) -> BoxFuture<'static, Response> {
        (self.0)(request, collection)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

/// What an operation resolved to when the router was built.
#[derive(Debug, Clone)]
pub enum OperationHandler {
    Default,
    Custom(Handler),
}

/// How the default handlers treat a record's `username` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ownership {
    Open,
    /// Create stamps the caller's username; show, update and destroy require it to match.
    Owned,
}

/// Create collection `name` on `store` and a router serving it.
///
/// Unset fields of `config` take the open defaults: every record listed, a single
/// pass-through middleware, timestamps on and strict schema.
pub async fn build(
    store: Arc<dyn DocumentStore>,
    name: &str,
    schema: Schema,
    config: ResourceConfig,
) -> StoreResult<(Collection, Router)> {
    assemble(store, name, schema, config, Ownership::Open).await
}

pub(crate) async fn assemble(
    store: Arc<dyn DocumentStore>,
    name: &str,
    schema: Schema,
    config: ResourceConfig,
    ownership: Ownership,
) -> StoreResult<(Collection, Router)> {
    let resolved = config.resolve();
    let collection = Collection::open(store, name, schema, resolved.schema_options).await?;

    let custom: Vec<&str> = Operation::ALL
        .into_iter()
        .filter(|op| matches!(resolved.handlers.get(*op), OperationHandler::Custom(_)))
        .map(|op| op.as_str())
        .collect();
    tracing::info!(
        resource = name,
        ?ownership,
        middleware = resolved.middleware.len(),
        custom = ?custom,
        "resource mounted"
    );

    let state = Arc::new(ResourceState {
        collection: collection.clone(),
        index_query: resolved.index_query,
        handlers: resolved.handlers,
        ownership,
    });

    let router = Router::new()
        .route("/", get(handlers::index).post(handlers::create))
        .route(
            "/:id",
            get(handlers::show).put(handlers::update).delete(handlers::destroy),
        )
        .with_state(state);

    Ok((collection, apply_chain(router, &resolved.middleware)))
}
