pub mod auth;

use axum::{extract::Request, middleware::Next, response::Response, Router};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

pub use auth::{bearer_auth, AUTH_FAILED, MISSING_BEARER};

/// One step of a resource's middleware chain. It either answers the request itself
/// or hands it on with `next.run(request)`.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>);

impl Middleware {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self(Arc::new(move |request: Request, next: Next| -> BoxFuture<'static, Response> {
            Box::pin(f(request, next))
        }))
    }

    /// Continue to the next step unchanged.
    pub fn pass_through() -> Self {
        Self::new(|request: Request, next: Next| next.run(request))
    }

    pub fn call(&self, request: Request, next: Next) -> BoxFuture<'static, Response> {
        (self.0)(request, next)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Middleware")
    }
}

/// Insert a clone of `value` into every request's extensions, readable with
/// `Extension<T>` or `request.extensions().get::<T>()` downstream.
pub fn inject<T>(value: T) -> Middleware
where
    T: Clone + Send + Sync + 'static,
{
    Middleware::new(move |mut request: Request, next: Next| {
        request.extensions_mut().insert(value.clone());
        next.run(request)
    })
}

/// Layer `chain` onto every route of `router` so that it runs in slice order.
pub fn apply_chain(router: Router, chain: &[Middleware]) -> Router {
    // the last layer added is the outermost, so add the chain back to front
    chain.iter().rev().fold(router, |router, middleware| {
        let middleware = middleware.clone();
        router.layer(axum::middleware::from_fn(move |request: Request, next: Next| {
            middleware.call(request, next)
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::get, Extension};
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn recorder(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Middleware {
        Middleware::new(move |request: Request, next: Next| {
            log.lock().unwrap().push(name);
            next.run(request)
        })
    }

    #[tokio::test]
    async fn chain_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = vec![recorder(log.clone(), "first"), recorder(log.clone(), "second")];
        let app = apply_chain(Router::new().route("/", get(|| async { "ok" })), &chain);

        let response = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let deny = Middleware::new(|_request: Request, _next: Next| async {
            (StatusCode::BAD_REQUEST, "denied").into_response()
        });
        let app = apply_chain(
            Router::new().route("/", get(|| async { "ok" })),
            &[Middleware::pass_through(), deny],
        );
        let response = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn inject_exposes_value_to_handlers() {
        #[derive(Clone)]
        struct Greeting(&'static str);

        let app = apply_chain(
            Router::new().route("/", get(|Extension(g): Extension<Greeting>| async move { g.0 })),
            &[inject(Greeting("hello"))],
        );
        let response = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }
}
