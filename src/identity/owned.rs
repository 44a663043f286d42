use axum::{extract::Request, Router};
use std::sync::Arc;

use crate::database::{Collection, DocumentStore, FieldDef, Filter, Schema, StoreResult};
use crate::middleware::Middleware;
use crate::resource::{self, caller_username, Ownership, ResourceConfig};

/// Resource factory whose records belong to the authenticated user.
///
/// Routers built here require a bearer token, list only the caller's records, stamp
/// the caller's `username` on create, and refuse show/update/delete of another user's
/// record with `NOT THIS USERS ITEM`. A caller-supplied middleware chain replaces the
/// default one, auth included; operation overrides skip the ownership checks.
#[derive(Clone)]
pub struct OwnedResources {
    store: Arc<dyn DocumentStore>,
    auth: Middleware,
}

impl std::fmt::Debug for OwnedResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedResources").finish_non_exhaustive()
    }
}

impl OwnedResources {
    pub fn new(store: Arc<dyn DocumentStore>, auth: Middleware) -> Self {
        Self { store, auth }
    }

    pub async fn build(
        &self,
        name: &str,
        schema: Schema,
        config: ResourceConfig,
    ) -> StoreResult<(Collection, Router)> {
        let schema = schema.field("username", FieldDef::string().required());
        let config = config.merge_over(self.defaults());
        resource::assemble(self.store.clone(), name, schema, config, Ownership::Owned).await
    }

    fn defaults(&self) -> ResourceConfig {
        ResourceConfig::new()
            .middleware(vec![Middleware::pass_through(), self.auth.clone()])
            .index_query(|request: &Request| {
                let username = caller_username(request)?;
                Ok(Filter::all().eq("username", username))
            })
    }
}
