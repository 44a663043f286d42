//! User registration, login, and bearer-token protection for resources.

mod handlers;
mod owned;

use axum::Router;
use chrono::Duration;
use std::sync::Arc;

use crate::auth::{TokenOptions, TokenSigner};
use crate::config::{AppConfig, Environment};
use crate::database::{Collection, DocumentStore, FieldDef, Schema, SchemaOptions, StoreError};
use crate::middleware::{bearer_auth, Middleware};

pub use handlers::{NO_SUCH_USER, PASSWORD_MISMATCH};
pub use owned::OwnedResources;

/// Signing secret used when development runs without `JWT_SECRET`.
pub const DEV_SECRET: &str = "rester-development-secret";

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub collection: String,
    /// Extra user fields, merged over the base `username`/`password` fields.
    pub user_fields: Schema,
    pub schema_options: SchemaOptions,
    pub secret: Option<String>,
    pub token: TokenOptions,
    pub environment: Environment,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            collection: "users".to_string(),
            user_fields: Schema::new(),
            schema_options: SchemaOptions::default(),
            secret: None,
            token: TokenOptions::default(),
            environment: Environment::from_env(),
        }
    }
}

impl IdentityConfig {
    pub fn from_app_config(app: &AppConfig) -> Self {
        Self {
            secret: app.security.jwt_secret.clone(),
            token: TokenOptions {
                expires_in: app.security.jwt_expiry_hours.map(|h| Duration::hours(h as i64)),
            },
            environment: app.environment,
            ..Self::default()
        }
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn user_fields(mut self, fields: Schema) -> Self {
        self.user_fields = fields;
        self
    }

    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.token.expires_in = Some(lifetime);
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("JWT_SECRET must be set outside development (environment: {0:?})")]
    MissingSecret(Environment),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the identity subsystem hands back to the application.
pub struct Identity {
    /// Persistence handle for user records.
    pub users: Collection,
    /// Bearer-token middleware, for protecting routes outside [`OwnedResources`].
    pub auth: Middleware,
    /// `POST /register` and `POST /login`.
    pub router: Router,
    pub resources: OwnedResources,
}

impl Identity {
    pub async fn build(store: Arc<dyn DocumentStore>, config: IdentityConfig) -> Result<Self, IdentityError> {
        let secret = resolve_secret(config.secret, config.environment)?;
        let signer = TokenSigner::new(&secret, config.token);

        let schema = base_user_schema().merge(config.user_fields);
        let users = Collection::open(store.clone(), config.collection, schema, config.schema_options).await?;

        let auth = bearer_auth(signer.clone());
        let router = handlers::router(users.clone(), signer);
        let resources = OwnedResources::new(store, auth.clone());

        tracing::info!(collection = users.name(), "identity subsystem ready");
        Ok(Self {
            users,
            auth,
            router,
            resources,
        })
    }

    pub fn into_parts(self) -> (Collection, Middleware, Router, OwnedResources) {
        (self.users, self.auth, self.router, self.resources)
    }
}

fn base_user_schema() -> Schema {
    Schema::new()
        .field("username", FieldDef::string().required().unique())
        .field("password", FieldDef::string().required())
}

fn resolve_secret(secret: Option<String>, environment: Environment) -> Result<String, IdentityError> {
    match secret.filter(|s| !s.is_empty()) {
        Some(secret) => Ok(secret),
        None if environment.is_development() => {
            tracing::warn!("JWT_SECRET not set, signing tokens with the development secret");
            Ok(DEV_SECRET.to_string())
        }
        None => Err(IdentityError::MissingSecret(environment)),
    }
}
