// app.rs - assemble the demo server from a manifest

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::database::{ConnectionMonitor, DocumentStore, StoreError};
use crate::identity::{Identity, IdentityConfig, IdentityError};
use crate::manifest::{Manifest, ManifestError};
use crate::resource::{self, ResourceConfig};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("resource '{name}': {source}")]
    Resource {
        name: String,
        #[source]
        source: StoreError,
    },
}

/// Mount identity at `/auth` and every manifest resource at `/<name>`, plus `/health`.
pub async fn router(
    store: Arc<dyn DocumentStore>,
    manifest: Manifest,
    identity: IdentityConfig,
    monitor: Option<ConnectionMonitor>,
) -> Result<Router, AppError> {
    // no resource may shadow the users collection
    manifest.validate(&[identity.collection.as_str()])?;

    let identity = Identity::build(store.clone(), identity.user_fields(manifest.users)).await?;
    let mut app = Router::new()
        .route("/health", get(health).with_state(Arc::new(monitor)))
        .nest("/auth", identity.router);

    for spec in manifest.resources {
        let mut config = ResourceConfig::new();
        if let Some(options) = spec.options {
            config = config.schema_options(options);
        }

        let built = if spec.owned {
            identity.resources.build(&spec.name, spec.schema, config).await
        } else {
            resource::build(store.clone(), &spec.name, spec.schema, config).await
        };
        let (_, resource_router) = built.map_err(|source| AppError::Resource {
            name: spec.name.clone(),
            source,
        })?;

        app = app.nest(&format!("/{}", spec.name), resource_router);
    }

    Ok(app)
}

async fn health(State(monitor): State<Arc<Option<ConnectionMonitor>>>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    let Some(monitor) = monitor.as_ref() else {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "memory" })),
        );
    };

    match monitor.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "ok" })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "error": "database unavailable",
                "database_error": e.to_string()
            })),
        ),
    }
}
