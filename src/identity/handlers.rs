// identity/handlers.rs - POST /register and POST /login

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::{TokenPayload, TokenSigner};
use crate::database::{Collection, Document, Filter};
use crate::error::ApiError;

pub const NO_SUCH_USER: &str = "NO SUCH USER";
pub const PASSWORD_MISMATCH: &str = "PASSWORD DOES NOT MATCH";

pub(crate) struct IdentityState {
    users: Collection,
    signer: TokenSigner,
}

pub(crate) fn router(users: Collection, signer: TokenSigner) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(Arc::new(IdentityState { users, signer }))
}

/// POST /register - create a user from the request body with its password hashed.
/// Answers with the stored user, hash included.
pub(crate) async fn register(
    State(state): State<Arc<IdentityState>>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    register_user(&state, body).await.map_err(|e| logged("register", e))
}

/// POST /login - exchange `{username, password}` for `{token}`.
pub(crate) async fn login(
    State(state): State<Arc<IdentityState>>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    login_user(&state, body).await.map_err(|e| logged("login", e))
}

async fn register_user(
    state: &IdentityState,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(mut body) = body?;

    let password = match body.get("password") {
        Some(Value::String(password)) => password.clone(),
        _ => return Err(ApiError::bad_request("password must be a string")),
    };
    let hash = hash_password_blocking(password)
        .await
        .map_err(|e| ApiError::internal(format!("password hashing failed: {}", e)))?;
    body.insert("password".into(), Value::String(hash));

    let user = state.users.create(body).await?;
    tracing::info!(username = ?user.get("username"), "user registered");
    Ok(Json(Value::Object(user)))
}

async fn login_user(
    state: &IdentityState,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;

    let username = body.get("username").cloned().unwrap_or(Value::Null);
    let user = state
        .users
        .find_one(&Filter::all().eq("username", username))
        .await?
        .ok_or_else(|| ApiError::bad_request(NO_SUCH_USER))?;

    let hash = user.get("password").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    let matches = verify_password_blocking(hash.to_string(), password.to_string())
        .await
        .map_err(|e| ApiError::internal(format!("stored password is unreadable: {}", e)))?;
    if !matches {
        return Err(ApiError::bad_request(PASSWORD_MISMATCH));
    }

    let token = state.signer.sign(&TokenPayload::from_user(user))?;
    Ok(Json(json!({ "token": token })))
}

fn logged(operation: &'static str, e: ApiError) -> ApiError {
    tracing::error!(resource = "identity", operation, code = e.error_code(), "{}", e);
    e
}
