use axum::{
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, RequestExt,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::config::Handlers;
use super::{IndexQuery, Operation, OperationHandler, Ownership, ITEM_MISSING, NOT_OWNER};
use crate::auth::TokenPayload;
use crate::database::{Collection, Document};
use crate::error::ApiError;
use crate::middleware::AUTH_FAILED;

pub(crate) struct ResourceState {
    pub collection: Collection,
    pub index_query: IndexQuery,
    pub handlers: Handlers,
    pub ownership: Ownership,
}

type SharedState = State<Arc<ResourceState>>;

pub(crate) async fn index(State(state): SharedState, request: Request) -> Response {
    dispatch(state, Operation::Index, request, default_index).await
}

pub(crate) async fn show(State(state): SharedState, request: Request) -> Response {
    dispatch(state, Operation::Show, request, default_show).await
}

pub(crate) async fn create(State(state): SharedState, request: Request) -> Response {
    dispatch(state, Operation::Create, request, default_create).await
}

pub(crate) async fn update(State(state): SharedState, request: Request) -> Response {
    dispatch(state, Operation::Update, request, default_update).await
}

pub(crate) async fn destroy(State(state): SharedState, request: Request) -> Response {
    dispatch(state, Operation::Destroy, request, default_destroy).await
}

/// Run the caller's handler if one was configured, otherwise the default one.
async fn dispatch<F, Fut>(
    state: Arc<ResourceState>,
    operation: Operation,
    request: Request,
    default: F,
) -> Response
where
    F: FnOnce(Arc<ResourceState>, Request) -> Fut,
    Fut: Future<Output = Result<Value, ApiError>>,
{
    match state.handlers.get(operation) {
        OperationHandler::Custom(handler) => handler.call(request, state.collection.clone()).await,
        OperationHandler::Default => match default(state.clone(), request).await {
            Ok(body) => (StatusCode::OK, Json(body)).into_response(),
            Err(e) => {
                tracing::error!(
                    resource = state.collection.name(),
                    operation = operation.as_str(),
                    code = e.error_code(),
                    "{}",
                    e
                );
                e.into_response()
            }
        },
    }
}

async fn default_index(state: Arc<ResourceState>, request: Request) -> Result<Value, ApiError> {
    let filter = (state.index_query)(&request)?;
    let docs = state.collection.find(&filter).await?;
    Ok(Value::Array(docs.into_iter().map(Value::Object).collect()))
}

async fn default_show(state: Arc<ResourceState>, mut request: Request) -> Result<Value, ApiError> {
    let id = path_id(&mut request).await?;
    let owner = match state.ownership {
        Ownership::Owned => Some(caller_username(&request)?),
        Ownership::Open => None,
    };

    let doc = state.collection.find_by_id(&id).await?;
    if let (Some(owner), Some(doc)) = (owner, &doc) {
        check_owner(doc, &owner)?;
    }
    Ok(doc.map(Value::Object).unwrap_or(Value::Null))
}

async fn default_create(state: Arc<ResourceState>, request: Request) -> Result<Value, ApiError> {
    let owner = match state.ownership {
        Ownership::Owned => Some(caller_username(&request)?),
        Ownership::Open => None,
    };

    let mut body = json_body(request).await?;
    if let Some(owner) = owner {
        body.insert("username".into(), Value::String(owner));
    }

    let created = state.collection.create(body).await?;
    Ok(Value::Object(created))
}

async fn default_update(state: Arc<ResourceState>, mut request: Request) -> Result<Value, ApiError> {
    let id = path_id(&mut request).await?;
    if state.ownership == Ownership::Owned {
        let owner = caller_username(&request)?;
        ensure_owner(&state.collection, &id, &owner).await?;
    }

    let body = json_body(request).await?;
    let updated = state.collection.update_by_id(&id, body).await?;
    Ok(updated.map(Value::Object).unwrap_or(Value::Null))
}

async fn default_destroy(state: Arc<ResourceState>, mut request: Request) -> Result<Value, ApiError> {
    let id = path_id(&mut request).await?;
    if state.ownership == Ownership::Owned {
        let owner = caller_username(&request)?;
        ensure_owner(&state.collection, &id, &owner).await?;
    }

    let deleted = state.collection.delete_by_id(&id).await?;
    Ok(deleted.map(Value::Object).unwrap_or(Value::Null))
}

async fn path_id(request: &mut Request) -> Result<String, ApiError> {
    let Path(mut params) = request
        .extract_parts::<Path<HashMap<String, String>>>()
        .await
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    params
        .remove("id")
        .ok_or_else(|| ApiError::bad_request("missing id path parameter"))
}

async fn json_body(request: Request) -> Result<Document, ApiError> {
    let Json(body) = Json::<Document>::from_request(request, &()).await?;
    Ok(body)
}

/// Username of the authenticated caller, as decoded by the bearer middleware.
pub(crate) fn caller_username(request: &Request) -> Result<String, ApiError> {
    request
        .extensions()
        .get::<TokenPayload>()
        .and_then(TokenPayload::username)
        .map(str::to_owned)
        .ok_or_else(|| ApiError::unauthorized(AUTH_FAILED))
}

async fn ensure_owner(collection: &Collection, id: &str, owner: &str) -> Result<(), ApiError> {
    let item = collection
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::bad_request(ITEM_MISSING))?;
    check_owner(&item, owner)
}

fn check_owner(item: &Document, owner: &str) -> Result<(), ApiError> {
    match item.get("username").and_then(Value::as_str) {
        Some(username) if username == owner => Ok(()),
        _ => Err(ApiError::forbidden(NOT_OWNER)),
    }
}
