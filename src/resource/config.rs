use axum::extract::Request;
use axum::response::IntoResponse;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::{Handler, IndexQuery, Operation, OperationHandler};
use crate::database::{Collection, Filter, SchemaOptions};
use crate::error::ApiError;
use crate::middleware::Middleware;

/// Caller-facing resource configuration. Unset fields fall back to the defaults of the
/// factory the config is handed to; set fields always win.
#[derive(Clone, Default)]
pub struct ResourceConfig {
    pub index_query: Option<IndexQuery>,
    pub middleware: Option<Vec<Middleware>>,
    pub schema_options: Option<SchemaOptions>,
    pub overrides: HashMap<Operation, Handler>,
}

impl std::fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("index_query", &self.index_query.is_some())
            .field("middleware", &self.middleware.as_ref().map(Vec::len))
            .field("schema_options", &self.schema_options)
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter used by the default list handler, evaluated per request.
    pub fn index_query<F>(mut self, query: F) -> Self
    where
        F: Fn(&Request) -> Result<Filter, ApiError> + Send + Sync + 'static,
    {
        self.index_query = Some(Arc::new(query));
        self
    }

    /// Replace the whole middleware chain.
    pub fn middleware(mut self, chain: Vec<Middleware>) -> Self {
        self.middleware = Some(chain);
        self
    }

    pub fn schema_options(mut self, options: SchemaOptions) -> Self {
        self.schema_options = Some(options);
        self
    }

    pub fn override_operation(mut self, operation: Operation, handler: Handler) -> Self {
        self.overrides.insert(operation, handler);
        self
    }

    pub fn index<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Request, Collection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.override_operation(Operation::Index, Handler::new(handler))
    }

    pub fn show<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Request, Collection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.override_operation(Operation::Show, Handler::new(handler))
    }

    pub fn create<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Request, Collection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.override_operation(Operation::Create, Handler::new(handler))
    }

    pub fn update<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Request, Collection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.override_operation(Operation::Update, Handler::new(handler))
    }

    pub fn destroy<F, Fut, R>(self, handler: F) -> Self
    where
        F: Fn(Request, Collection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.override_operation(Operation::Destroy, Handler::new(handler))
    }

    /// Lay `self` over `defaults`: every field set on `self` wins.
    pub fn merge_over(self, defaults: ResourceConfig) -> ResourceConfig {
        let mut overrides = defaults.overrides;
        overrides.extend(self.overrides);
        ResourceConfig {
            index_query: self.index_query.or(defaults.index_query),
            middleware: self.middleware.or(defaults.middleware),
            schema_options: self.schema_options.or(defaults.schema_options),
            overrides,
        }
    }

    /// Fill anything still unset with the open defaults and pick one handler per operation.
    pub(crate) fn resolve(mut self) -> ResolvedConfig {
        let mut take = |operation: Operation| {
            self.overrides
                .remove(&operation)
                .map(OperationHandler::Custom)
                .unwrap_or(OperationHandler::Default)
        };
        let handlers = Handlers {
            index: take(Operation::Index),
            show: take(Operation::Show),
            create: take(Operation::Create),
            update: take(Operation::Update),
            destroy: take(Operation::Destroy),
        };

        let index_query: IndexQuery = match self.index_query {
            Some(query) => query,
            None => Arc::new(|_: &Request| Ok::<_, ApiError>(Filter::all())),
        };

        ResolvedConfig {
            index_query,
            middleware: self.middleware.unwrap_or_else(|| vec![Middleware::pass_through()]),
            schema_options: self.schema_options.unwrap_or_default(),
            handlers,
        }
    }
}

pub(crate) struct ResolvedConfig {
    pub index_query: IndexQuery,
    pub middleware: Vec<Middleware>,
    pub schema_options: SchemaOptions,
    pub handlers: Handlers,
}

pub(crate) struct Handlers {
    pub index: OperationHandler,
    pub show: OperationHandler,
    pub create: OperationHandler,
    pub update: OperationHandler,
    pub destroy: OperationHandler,
}

impl Handlers {
    pub fn get(&self, operation: Operation) -> &OperationHandler {
        match operation {
            Operation::Index => &self.index,
            Operation::Show => &self.show,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Destroy => &self.destroy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn caller_fields_win_over_defaults() {
        let defaults = ResourceConfig::new()
            .middleware(vec![Middleware::pass_through(), Middleware::pass_through()])
            .schema_options(SchemaOptions { timestamps: true, strict: true });
        let caller = ResourceConfig::new().schema_options(SchemaOptions { timestamps: false, strict: true });

        let merged = caller.merge_over(defaults);
        assert_eq!(merged.middleware.as_ref().map(Vec::len), Some(2));
        assert!(!merged.schema_options.unwrap().timestamps);
    }

    #[test]
    fn resolve_fills_open_defaults() {
        let resolved = ResourceConfig::new().resolve();
        assert_eq!(resolved.middleware.len(), 1);
        assert!(resolved.schema_options.timestamps);
        for operation in Operation::ALL {
            assert!(matches!(resolved.handlers.get(operation), OperationHandler::Default));
        }
    }

    #[test]
    fn overrides_resolve_to_custom_handlers() {
        let resolved = ResourceConfig::new()
            .destroy(|_request, _collection| async { StatusCode::IM_A_TEAPOT })
            .resolve();
        assert!(matches!(resolved.handlers.get(Operation::Destroy), OperationHandler::Custom(_)));
        assert!(matches!(resolved.handlers.get(Operation::Update), OperationHandler::Default));
    }
}
