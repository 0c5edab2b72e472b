//! Standardized error handling for Quay applications.
//!
//! [`Error`] converts to a JSON response:
//!
//! ```json
//! {"error": {"code": "NOT_FOUND", "message": "note 3 not found"}, "trace_id": "..."}
//! ```
//!
//! A response produced from an [`Error`] also carries the error itself as a
//! response extension. The dispatcher uses it to re-render the body with the
//! request's trace id, to mask internal messages outside debug mode, and in
//! testing mode to hand 5xx errors back to the caller as a
//! [`PropagatedError`] instead of a rendered page.
//!
//! # Domain Errors
//!
//! ```rust
//! use quay::error::{Error, IntoApiError};
//!
//! enum NoteError {
//!     NotFound(u64),
//!     Locked,
//! }
//!
//! impl IntoApiError for NoteError {
//!     fn into_api_error(self) -> Error {
//!         match self {
//!             NoteError::NotFound(id) => Error::not_found(format!("note {} not found", id)),
//!             NoteError::Locked => Error::conflict("note is locked"),
//!         }
//!     }
//! }
//! ```

use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Serialize;
use std::fmt;

use crate::response::{APPLICATION_JSON, BoxBody, IntoResponse, buffered};

/// Message shown instead of the real one for 5xx errors outside debug mode.
pub const MASKED_MESSAGE: &str = "internal server error";

/// The JSON structure returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// The error details.
    pub error: ErrorDetail,
    /// Unique identifier for request tracing.
    pub trace_id: String,
}

/// Detailed error information in the response body.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The main error type for Quay applications.
///
/// ```
/// use quay::error::Error;
///
/// let err = Error::not_found("note not found");
/// assert_eq!(err.status, 404);
///
/// let err = Error::validation("title is required")
///     .with_details(serde_json::json!({"field": "title"}));
/// assert!(err.details.is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error details.
    pub details: Option<serde_json::Value>,
    /// Trace ID of the request that failed, once known.
    pub trace_id: Option<String>,
}

impl Error {
    /// Creates a new error with the given status code, code, and message.
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            trace_id: None,
        }
    }

    /// Adds additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the trace ID for this error.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Creates a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "BAD_REQUEST", message)
    }

    /// Creates a 401 Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, "UNAUTHORIZED", message)
    }

    /// Creates a 403 Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, "FORBIDDEN", message)
    }

    /// Creates a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, "NOT_FOUND", message)
    }

    /// Creates a 405 Method Not Allowed error.
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(405, "METHOD_NOT_ALLOWED", message)
    }

    /// Creates a 409 Conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, "CONFLICT", message)
    }

    /// Creates a 413 Payload Too Large error.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(413, "PAYLOAD_TOO_LARGE", message)
    }

    /// Creates a 422 Validation Error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(422, "VALIDATION_ERROR", message)
    }

    /// Creates a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "INTERNAL_ERROR", message)
    }

    /// Whether this is a 5xx error.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Converts this error to an ErrorResponse with the given trace ID.
    pub fn to_response(&self, trace_id: String) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.code.clone(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
            trace_id,
        }
    }

    /// Renders the error for `trace_id`.
    ///
    /// With `expose_internal` unset, 5xx messages are replaced by
    /// [`MASKED_MESSAGE`] and their details dropped.
    pub fn render(&self, trace_id: &str, expose_internal: bool) -> http::Response<BoxBody> {
        let mut body = self.to_response(trace_id.to_string());
        if self.is_server_error() && !expose_internal {
            body.error.message = MASKED_MESSAGE.to_string();
            body.error.details = None;
        }

        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = buffered(
            status,
            Some(APPLICATION_JSON),
            serde_json::to_vec(&body).unwrap_or_default(),
        );
        response
            .extensions_mut()
            .insert(self.clone().with_trace_id(trace_id));
        response
    }

    /// Re-renders `response` as this error for `trace_id`.
    ///
    /// Status, headers and extensions of `response` are kept; only the body and
    /// its content headers are replaced. Headers such as `Allow` or
    /// `x-trace-id` set further up the chain survive.
    pub fn render_into(
        &self,
        response: http::Response<BoxBody>,
        trace_id: &str,
        expose_internal: bool,
    ) -> http::Response<BoxBody> {
        let (mut parts, _) = response.into_parts();
        let (rendered, body) = self.render(trace_id, expose_internal).into_parts();

        parts.headers.remove(CONTENT_LENGTH);
        if let Some(content_type) = rendered.headers.get(CONTENT_TYPE) {
            parts.headers.insert(CONTENT_TYPE, content_type.clone());
        }
        parts
            .extensions
            .insert(self.clone().with_trace_id(trace_id));

        http::Response::from_parts(parts, body)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

/// Trait for converting domain errors into API errors.
///
/// Implementing it enables `?` on domain errors inside handlers returning
/// [`Result`].
pub trait IntoApiError {
    /// Converts this error into an API error.
    fn into_api_error(self) -> Error;
}

impl<T: IntoApiError> From<T> for Error {
    fn from(err: T) -> Self {
        err.into_api_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> http::Response<BoxBody> {
        // the dispatcher re-renders with the request's trace id
        let trace_id = self
            .trace_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.render(&trace_id, true)
    }
}

/// A server error handed back to the caller instead of being rendered.
///
/// Returned by [`App::dispatch`](crate::app::App::dispatch) when the
/// application propagates exceptions (testing mode by default).
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedError(pub Error);

impl PropagatedError {
    /// Returns the underlying error.
    pub fn error(&self) -> &Error {
        &self.0
    }

    /// Consumes the wrapper and returns the underlying error.
    pub fn into_inner(self) -> Error {
        self.0
    }
}

impl fmt::Display for PropagatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.trace_id {
            Some(trace_id) => write!(f, "unhandled error ({}) [trace {}]", self.0, trace_id),
            None => write!(f, "unhandled error ({})", self.0),
        }
    }
}

impl std::error::Error for PropagatedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// A type alias for `Result<T, Error>`.
///
/// This is the standard result type used throughout Quay handlers.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    enum NoteError {
        NotFound(u64),
        Locked,
    }

    impl IntoApiError for NoteError {
        fn into_api_error(self) -> Error {
            match self {
                NoteError::NotFound(id) => Error::not_found(format!("note {} not found", id)),
                NoteError::Locked => Error::conflict("note is locked"),
            }
        }
    }

    async fn json_of(response: http::Response<BoxBody>) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_domain_error_conversion() {
        let err: Error = NoteError::NotFound(9).into();
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "note 9 not found");

        let err: Error = NoteError::Locked.into();
        assert_eq!(err.code, "CONFLICT");
    }

    #[test]
    fn test_constructors() {
        let cases = [
            (Error::bad_request("x"), 400, "BAD_REQUEST"),
            (Error::unauthorized("x"), 401, "UNAUTHORIZED"),
            (Error::forbidden("x"), 403, "FORBIDDEN"),
            (Error::not_found("x"), 404, "NOT_FOUND"),
            (Error::method_not_allowed("x"), 405, "METHOD_NOT_ALLOWED"),
            (Error::conflict("x"), 409, "CONFLICT"),
            (Error::payload_too_large("x"), 413, "PAYLOAD_TOO_LARGE"),
            (Error::validation("x"), 422, "VALIDATION_ERROR"),
            (Error::internal("x"), 500, "INTERNAL_ERROR"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status, status);
            assert_eq!(err.code, code);
        }
    }

    #[test]
    fn test_is_server_error() {
        assert!(Error::internal("boom").is_server_error());
        assert!(Error::new(503, "UNAVAILABLE", "down").is_server_error());
        assert!(!Error::conflict("taken").is_server_error());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::bad_request("invalid input").to_string(),
            "BAD_REQUEST: invalid input"
        );
    }

    #[tokio::test]
    async fn test_render_client_error_keeps_message() {
        let response = Error::not_found("note 1 not found").render("trace-1", false);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "note 1 not found");
        assert_eq!(json["trace_id"], "trace-1");
        assert!(json["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_render_masks_server_error() {
        let response = Error::internal("db password leaked")
            .with_details(serde_json::json!({"secret": true}))
            .render("trace-2", false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], MASKED_MESSAGE);
        assert!(json["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_render_exposes_server_error_in_debug() {
        let response = Error::internal("db unreachable").render("trace-3", true);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "db unreachable");
    }

    #[test]
    fn test_render_attaches_error_extension() {
        let response = Error::conflict("taken").render("trace-4", true);
        let attached = response.extensions().get::<Error>().unwrap();
        assert_eq!(attached.code, "CONFLICT");
        assert_eq!(attached.trace_id.as_deref(), Some("trace-4"));
    }

    #[tokio::test]
    async fn test_render_into_keeps_headers_and_status() {
        let mut response = Error::method_not_allowed("nope").into_response();
        response
            .headers_mut()
            .insert(http::header::ALLOW, http::HeaderValue::from_static("GET, POST"));
        response
            .headers_mut()
            .insert("x-trace-id", http::HeaderValue::from_static("trace-5"));

        let err = response.extensions().get::<Error>().unwrap().clone();
        let response = err.render_into(response, "trace-5", false);

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[http::header::ALLOW], "GET, POST");
        assert_eq!(response.headers()["x-trace-id"], "trace-5");
        assert_eq!(response.headers()[CONTENT_TYPE], APPLICATION_JSON);
        assert_eq!(
            response.extensions().get::<Error>().unwrap().trace_id.as_deref(),
            Some("trace-5")
        );

        let json = json_of(response).await;
        assert_eq!(json["trace_id"], "trace-5");
    }

    #[tokio::test]
    async fn test_render_into_masks_server_error() {
        let response = Error::internal("db password is hunter2").into_response();
        let response = Error::internal("db password is hunter2").render_into(response, "t-1", false);

        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], MASKED_MESSAGE);
        assert_eq!(json["trace_id"], "t-1");
    }

    #[tokio::test]
    async fn test_into_response_generates_trace_id() {
        let json = json_of(Error::bad_request("nope").into_response()).await;
        assert_eq!(json["trace_id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn test_propagated_error_display() {
        let err = PropagatedError(Error::internal("boom").with_trace_id("t-1"));
        assert_eq!(err.to_string(), "unhandled error (INTERNAL_ERROR: boom) [trace t-1]");
        assert_eq!(err.error().status, 500);
        assert_eq!(err.into_inner().message, "boom");
    }
}
