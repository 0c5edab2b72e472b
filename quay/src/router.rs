//! HTTP routing for Quay applications.
//!
//! The [`Router`] type collects route definitions and matches incoming
//! requests to the appropriate handlers.

use std::future::Future;
use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, Method, Response};

use crate::error::Error;
use crate::extract::{PathParams, extract_path_params};
use crate::handler::{HandlerFn, Request, boxed, run_guarded};
use crate::response::{BoxBody, IntoResponse};
use crate::state::AppState;

pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) pattern: String,
    handler: HandlerFn,
}

/// The HTTP router for matching requests to handlers.
///
/// Routes are matched in the order they are added. Use path parameters
/// with the `:param` syntax. A path that matches a route under another
/// method answers 405 with an `Allow` header; an unknown path answers 404.
///
/// # Examples
///
/// ```
/// use quay::prelude::*;
///
/// let router = Router::new()
///     .get("/", |_, _, _| async { "Hello!" })
///     .get("/notes/:id", |_, _, _| async { "Note" })
///     .post("/notes", |_, _, _| async { StatusCode::CREATED });
/// ```
#[derive(Default)]
pub struct Router {
    pub(crate) routes: Vec<Route>,
}

macro_rules! method_shortcut {
    ($(#[$doc:meta] $name:ident => $method:expr),* $(,)?) => {
        $(
            #[$doc]
            pub fn $name<F, Fut, Out>(self, pattern: &str, handler: F) -> Self
            where
                F: Fn(Request, PathParams, Arc<AppState>) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = Out> + Send + 'static,
                Out: IntoResponse + 'static,
            {
                self.route($method, pattern, handler)
            }
        )*
    };
}

impl Router {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route with the given HTTP method and pattern.
    pub fn route<F, Fut, Out>(mut self, method: Method, pattern: &str, handler: F) -> Self
    where
        F: Fn(Request, PathParams, Arc<AppState>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
        Out: IntoResponse + 'static,
    {
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            handler: boxed(handler),
        });
        self
    }

    method_shortcut! {
        /// Adds a GET route.
        get => Method::GET,
        /// Adds a POST route.
        post => Method::POST,
        /// Adds a PUT route.
        put => Method::PUT,
        /// Adds a PATCH route.
        patch => Method::PATCH,
        /// Adds a DELETE route.
        delete => Method::DELETE,
    }

    /// Appends every route of `other` after the existing ones.
    pub fn merge(mut self, other: Router) -> Self {
        self.routes.extend(other.routes);
        self
    }

    /// Lists `(method, pattern)` pairs in registration order.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routes
            .iter()
            .map(|route| (route.method.clone(), route.pattern.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handles a request by matching it to a route.
    pub async fn handle(&self, req: Request, state: &Arc<AppState>) -> Response<BoxBody> {
        let path = req.uri().path().to_string();
        let mut allowed: Vec<&Method> = Vec::new();
        let mut matched = None;

        for route in &self.routes {
            let Some(params) = extract_path_params(&route.pattern, &path) else {
                continue;
            };
            if route.method == *req.method() {
                matched = Some((route.handler.clone(), params));
                break;
            }
            if !allowed.contains(&&route.method) {
                allowed.push(&route.method);
            }
        }

        if let Some((handler, params)) = matched {
            return run_guarded(handler(req, params, state.clone())).await;
        }

        if allowed.is_empty() {
            return Error::not_found(format!("no route for {}", path)).into_response();
        }

        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = Error::method_not_allowed(format!(
            "{} is not allowed on {}",
            req.method(),
            path
        ))
        .into_response();
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(ALLOW, value);
        }
        response
    }
}
