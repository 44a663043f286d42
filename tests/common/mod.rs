#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use rester::config::Environment;
use rester::database::{DocumentStore, MemoryStore};
use rester::identity::{Identity, IdentityConfig};

pub const SECRET: &str = "integration-test-secret";

pub fn store() -> Arc<dyn DocumentStore> {
    Arc::new(MemoryStore::new())
}

pub fn identity_config() -> IdentityConfig {
    IdentityConfig::default()
        .secret(SECRET)
        .environment(Environment::Development)
}

pub async fn identity(store: Arc<dyn DocumentStore>) -> Result<Identity> {
    Ok(Identity::build(store, identity_config()).await?)
}

/// Drive `app` with one request and decode the body as JSON (plain text bodies come
/// back as a JSON string, empty bodies as null).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok((status, value))
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
    send(app, Method::GET, uri, token, None).await
}

pub async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
    send(app, Method::POST, uri, token, Some(body)).await
}

pub async fn put(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
    send(app, Method::PUT, uri, token, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
    send(app, Method::DELETE, uri, token, None).await
}

/// Register `username` (password `pw`) through the identity router and return a token.
pub async fn register_and_login(auth: &Router, username: &str) -> Result<String> {
    let credentials = json!({ "username": username, "password": "pw" });

    let (status, body) = post(auth, "/register", None, credentials.clone()).await?;
    anyhow::ensure!(status == StatusCode::OK, "register failed: {}", body);

    let (status, body) = post(auth, "/login", None, credentials).await?;
    anyhow::ensure!(status == StatusCode::OK, "login failed: {}", body);

    body["token"]
        .as_str()
        .map(str::to_owned)
        .context("login response has no token")
}

pub fn id_of(record: &Value) -> Result<String> {
    record["id"]
        .as_str()
        .map(str::to_owned)
        .context("record has no id")
}

/// Serve `app` on a free local port and return its base URL.
pub async fn serve(app: Router) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://127.0.0.1:{}", port))
}
