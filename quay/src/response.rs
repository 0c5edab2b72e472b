//! Response types and conversion traits.
//!
//! Handlers return anything implementing [`IntoResponse`]; the router turns
//! it into an `http::Response` with a fully buffered body.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Response, StatusCode};
use http_body_util::Full;

use crate::extract::Json;

/// The body type used for HTTP responses.
pub type BoxBody = Full<Bytes>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Trait for types that can be converted into an HTTP response.
///
/// # Examples
///
/// ```
/// use quay::response::{BoxBody, IntoResponse};
/// use http::Response;
///
/// struct Banner(&'static str);
///
/// impl IntoResponse for Banner {
///     fn into_response(self) -> Response<BoxBody> {
///         format!("** {} **", self.0).into_response()
///     }
/// }
/// ```
pub trait IntoResponse {
    /// Converts this type into an HTTP response.
    fn into_response(self) -> Response<BoxBody>;
}

/// Builds a response with an optional content type.
pub(crate) fn buffered(
    status: StatusCode,
    content_type: Option<&'static str>,
    body: impl Into<Bytes>,
) -> Response<BoxBody> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, http::HeaderValue::from_static(content_type));
    }
    response
}

impl IntoResponse for Response<BoxBody> {
    fn into_response(self) -> Response<BoxBody> {
        self
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response<BoxBody> {
        buffered(StatusCode::OK, Some(TEXT_PLAIN), self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response<BoxBody> {
        buffered(StatusCode::OK, Some(TEXT_PLAIN), self)
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response<BoxBody> {
        buffered(self, None, Bytes::new())
    }
}

impl IntoResponse for (StatusCode, String) {
    fn into_response(self) -> Response<BoxBody> {
        buffered(self.0, Some(TEXT_PLAIN), self.1)
    }
}

impl<T: serde::Serialize> IntoResponse for (StatusCode, Json<T>) {
    fn into_response(self) -> Response<BoxBody> {
        let mut response = self.1.into_response();
        if response.status().is_success() {
            *response.status_mut() = self.0;
        }
        response
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response<BoxBody> {
        StatusCode::NO_CONTENT.into_response()
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for std::result::Result<T, E> {
    fn into_response(self) -> Response<BoxBody> {
        match self {
            Ok(v) => v.into_response(),
            Err(e) => e.into_response(),
        }
    }
}
