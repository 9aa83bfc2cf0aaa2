//! Request router and dispatch.
//!
//! One radix tree per HTTP method, built once at startup and read-only
//! after. Matching is exact-string and case-sensitive on the path with the
//! query already stripped; there is no trailing-slash normalisation.
//!
//! [`Router::dispatch`] is the whole request lifecycle in one place: the
//! drain gate, route lookup, the 404/405 taxonomy, and the guarantee that
//! a request gets exactly one terminal response even when a handler
//! panics.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use hyper::body::Body;
use matchit::Router as PathTree;
use serde_json::json;
use tracing::error;

use crate::error::BoxError;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::Response;
use crate::shutdown::Shutdown;

/// The application route table.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so they chain naturally.
pub struct Router {
    routes: HashMap<Method, PathTree<BoxedHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for `GET path`.
    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    /// Register a handler for `POST path`.
    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// Register a handler for a method + path pair.
    ///
    /// # Panics
    ///
    /// Panics on an empty or duplicate path. Route-table mistakes are
    /// startup bugs, not runtime conditions.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<BoxedHandler> {
        let tree = self.routes.get(method)?;
        Some(Arc::clone(tree.at(path).ok()?.value))
    }

    /// Every method registered for `path`, sorted for a deterministic
    /// `Allow` header.
    fn allowed_methods(&self, path: &str) -> Vec<&Method> {
        let mut methods: Vec<&Method> = self
            .routes
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| method)
            .collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// Routes one request to one terminal [`Response`].
    ///
    /// Consults `shutdown` before matching: a draining process answers
    /// `503` with a connection-close advisory and performs no routing.
    /// Handlers run in their own task, so a panicking handler costs that
    /// request a `500` instead of costing the connection its response.
    pub async fn dispatch<B>(&self, shutdown: &Shutdown, req: http::Request<B>) -> Response
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        if shutdown.is_draining() {
            return Response::error(StatusCode::SERVICE_UNAVAILABLE).close();
        }

        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        match self.lookup(&method, &path) {
            Some(handler) => match tokio::spawn(handler.call(Request::from_http(req))).await {
                Ok(response) => response,
                Err(e) => {
                    error!(%method, %path, "handler failed: {e}");
                    Response::error(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            None => {
                let allowed = self.allowed_methods(&path);
                if allowed.is_empty() {
                    let body = serde_json::to_vec(&json!({ "error": "Not Found", "path": path }))
                        .unwrap_or_default();
                    Response::builder().status(StatusCode::NOT_FOUND).json(body)
                } else {
                    let allow =
                        allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                    let body = serde_json::to_vec(&json!({ "error": "Method Not Allowed" }))
                        .unwrap_or_default();
                    Response::builder()
                        .status(StatusCode::METHOD_NOT_ALLOWED)
                        .header("allow", &allow)
                        .json(body)
                }
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
