//! Request extractors for parsing incoming HTTP requests.
//!
//! Extractors implement [`FromRequest`] (may consume the body) or
//! [`FromRequestParts`] (metadata only) and are called from handlers:
//!
//! ```ignore
//! use quay::prelude::*;
//!
//! async fn create(req: Request, params: PathParams, state: Arc<AppState>) -> Result<Json<Note>> {
//!     let Json(input) = Json::<NewNote>::from_request(req, &params, &state).await?;
//!     // ...
//! }
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::Request;
use crate::response::{APPLICATION_JSON, BoxBody, IntoResponse, buffered};
use crate::state::AppState;

/// JSON request body, or JSON response.
#[derive(Debug)]
pub struct Json<T>(pub T);

/// The single path parameter of the matched route, parsed as `T`.
#[derive(Debug)]
pub struct Path<T>(pub T);

/// Query string parameters.
#[derive(Debug)]
pub struct Query<T>(pub T);

/// `application/x-www-form-urlencoded` request body.
#[derive(Debug)]
pub struct Form<T>(pub T);

/// Request headers.
#[derive(Debug)]
pub struct Headers(pub http::HeaderMap);

/// A clone of a value registered in the application state.
#[derive(Debug)]
pub struct State<T>(pub T);

/// The request context (trace id, start time).
#[derive(Debug)]
pub struct Context(pub RequestContext);

/// Type alias for path parameters extracted from the URL.
pub type PathParams = HashMap<String, String>;

/// Trait for extractors that consume the request body.
///
/// Only one body-consuming extractor can be used per request.
pub trait FromRequest: Sized {
    /// Extract the value from the request.
    fn from_request(
        req: Request,
        params: &PathParams,
        state: &Arc<AppState>,
    ) -> impl std::future::Future<Output = Result<Self, Error>> + Send;
}

/// Trait for extractors that only need request metadata.
pub trait FromRequestParts: Sized + Send {
    /// Extract the value from request parts.
    fn from_request_parts(
        parts: &http::request::Parts,
        params: &PathParams,
        state: &Arc<AppState>,
    ) -> impl std::future::Future<Output = Result<Self, Error>> + Send;
}

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Path<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Query<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Form<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Headers {
    /// Gets a header value by name.
    pub fn get(&self, key: &str) -> Option<&http::HeaderValue> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> http::HeaderMap {
        self.0
    }
}

impl<T> State<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Context {
    /// Returns the trace ID for this request.
    pub fn trace_id(&self) -> &str {
        &self.0.trace_id
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.0.elapsed()
    }

    pub fn into_inner(self) -> RequestContext {
        self.0
    }
}

fn content_type_is(parts: &http::request::Parts, expected: &str) -> bool {
    parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with(expected))
        .unwrap_or(false)
}

impl<T: DeserializeOwned + Send> FromRequest for Json<T> {
    async fn from_request(
        req: Request,
        _params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        let (parts, body) = req.into_parts();
        if !body.is_empty() && !content_type_is(&parts, APPLICATION_JSON) {
            return Err(Error::bad_request("expected content-type: application/json"));
        }

        let value: T = serde_json::from_slice(&body)
            .map_err(|e| Error::bad_request(format!("invalid JSON: {}", e)))?;

        Ok(Json(value))
    }
}

impl<T: serde::Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> http::Response<BoxBody> {
        match serde_json::to_vec(&self.0) {
            Ok(body) => buffered(http::StatusCode::OK, Some(APPLICATION_JSON), body),
            Err(e) => Error::internal(format!("failed to serialize response: {}", e)).into_response(),
        }
    }
}

impl<T: DeserializeOwned + Send> FromRequest for Form<T> {
    async fn from_request(
        req: Request,
        _params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        let (parts, body) = req.into_parts();
        if !content_type_is(&parts, "application/x-www-form-urlencoded") {
            return Err(Error::bad_request(
                "expected content-type: application/x-www-form-urlencoded",
            ));
        }

        let value: T = serde_urlencoded::from_bytes(&body)
            .map_err(|e| Error::bad_request(format!("invalid form data: {}", e)))?;

        Ok(Form(value))
    }
}

impl FromRequest for Bytes {
    async fn from_request(
        req: Request,
        _params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        Ok(req.into_body())
    }
}

impl<T: Clone + Send + Sync + 'static> FromRequestParts for State<T> {
    async fn from_request_parts(
        _parts: &http::request::Parts,
        _params: &PathParams,
        state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        let value = state
            .get::<T>()
            .ok_or_else(|| Error::internal(format!("state not found: {}", std::any::type_name::<T>())))?;
        Ok(State(value.clone()))
    }
}

impl FromRequestParts for Context {
    async fn from_request_parts(
        parts: &http::request::Parts,
        _params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Context)
            .ok_or_else(|| Error::internal("RequestContext not found"))
    }
}

impl<T: DeserializeOwned + Send> FromRequestParts for Query<T> {
    async fn from_request_parts(
        parts: &http::request::Parts,
        _params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        let query = parts.uri.query().unwrap_or("");
        let value: T = serde_urlencoded::from_str(query)
            .map_err(|e| Error::bad_request(format!("invalid query: {}", e)))?;
        Ok(Query(value))
    }
}

impl FromRequestParts for Headers {
    async fn from_request_parts(
        parts: &http::request::Parts,
        _params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        Ok(Headers(parts.headers.clone()))
    }
}

impl<T: FromStr + Send> FromRequestParts for Path<T>
where
    T::Err: std::fmt::Display,
{
    async fn from_request_parts(
        _parts: &http::request::Parts,
        params: &PathParams,
        _state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        let mut values = params.values();
        let (Some(value), None) = (values.next(), values.next()) else {
            return Err(Error::internal(format!(
                "Path expects exactly one route parameter, found {}",
                params.len()
            )));
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| Error::bad_request(format!("invalid path param: {}", e)))?;

        Ok(Path(parsed))
    }
}

impl<T: FromRequestParts> FromRequest for T {
    async fn from_request(
        req: Request,
        params: &PathParams,
        state: &Arc<AppState>,
    ) -> Result<Self, Error> {
        let (parts, _body) = req.into_parts();
        Self::from_request_parts(&parts, params, state).await
    }
}

/// Matches `path` against a `:param` pattern, returning the captured params.
pub fn extract_path_params(pattern: &str, path: &str) -> Option<PathParams> {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(param_name) = pattern_part.strip_prefix(':') {
            if path_part.is_empty() {
                return None;
            }
            params.insert(param_name.to_string(), path_part.to_string());
        } else if pattern_part != path_part {
            return None;
        }
    }

    Some(params)
}
