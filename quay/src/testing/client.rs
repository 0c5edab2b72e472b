//! In-process test client for Quay applications.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::app::App;
use crate::config::AppConfig;
use crate::error::PropagatedError;

/// A handle for issuing simulated requests against an [`App`].
///
/// Requests go straight through [`App::dispatch`]; no socket is opened.
/// The client is a scoped resource: creating it registers it with the
/// application, and dropping the last clone releases it exactly once
/// (see [`App::open_clients`]).
///
/// # Examples
///
/// ```ignore
/// use quay::prelude::*;
///
/// #[tokio::test]
/// async fn test_hello() {
///     let app = Quay::with_config(AppConfig::testing())
///         .router(Router::new().get("/", |_, _, _| async { "Hello!" }))
///         .build()
///         .unwrap();
///
///     let client = app.test_client();
///     let response = client.get("/").send().await;
///
///     assert_eq!(response.status(), StatusCode::OK);
///     assert_eq!(response.text(), "Hello!");
/// }
/// ```
#[derive(Clone)]
pub struct TestClient {
    session: Arc<Session>,
}

struct Session {
    app: App,
    cookies: Mutex<BTreeMap<String, String>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        let remaining = self.app.release_client();
        debug!(app = %self.app.config().name, remaining, "test client released");
    }
}

impl TestClient {
    /// Opens a client bound to `app`.
    pub fn new(app: App) -> Self {
        let open = app.acquire_client();
        debug!(app = %app.config().name, open, "test client opened");

        Self {
            session: Arc::new(Session {
                app,
                cookies: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// The application this client talks to.
    pub fn app(&self) -> &App {
        &self.session.app
    }

    /// Shorthand for `self.app().config()`.
    pub fn config(&self) -> &AppConfig {
        self.session.app.config()
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    /// Creates a POST request builder.
    pub fn post(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, path: &str) -> TestRequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    /// Creates a request builder with the given method and path.
    pub fn request(&self, method: Method, path: &str) -> TestRequestBuilder<'_> {
        TestRequestBuilder::new(self, method, path)
    }

    /// Current value of a cookie set by an earlier response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar().get(name).cloned()
    }

    /// Sets a cookie sent with every following request.
    pub fn set_cookie(&self, name: &str, value: &str) {
        self.jar().insert(name.to_string(), value.to_string());
    }

    /// Empties the cookie jar.
    pub fn clear_cookies(&self) {
        self.jar().clear();
    }

    fn jar(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // a poisoned jar only means a test panicked mid-update
        self.session
            .cookies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cookie_header(&self) -> Option<HeaderValue> {
        let jar = self.jar();
        if jar.is_empty() {
            return None;
        }
        let joined = jar
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }

    fn store_cookies(&self, headers: &HeaderMap) {
        let mut jar = self.jar();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let pair = value.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() {
                continue;
            }
            if value.is_empty() {
                jar.remove(name);
            } else {
                jar.insert(name.to_string(), value.to_string());
            }
        }
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("app", &self.session.app.config().name)
            .field("cookies", &self.jar().len())
            .finish()
    }
}

/// Builder for constructing test requests.
pub struct TestRequestBuilder<'a> {
    client: &'a TestClient,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl<'a> TestRequestBuilder<'a> {
    fn new(client: &'a TestClient, method: Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header to the request.
    ///
    /// # Panics
    ///
    /// Panics on an invalid header name or value.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        let name = HeaderName::from_bytes(key.as_bytes())
            .unwrap_or_else(|e| panic!("invalid header name {:?}: {}", key, e));
        let value = HeaderValue::from_str(value)
            .unwrap_or_else(|e| panic!("invalid value for header {:?}: {}", key, e));
        self.headers.append(name, value);
        self
    }

    /// Appends URL-encoded query parameters to the path.
    pub fn query<T: Serialize>(mut self, params: &T) -> Self {
        let encoded = serde_urlencoded::to_string(params)
            .unwrap_or_else(|e| panic!("query parameters failed to encode: {}", e));
        if !encoded.is_empty() {
            let separator = if self.path.contains('?') { '&' } else { '?' };
            self.path.push(separator);
            self.path.push_str(&encoded);
        }
        self
    }

    /// Sets a JSON body on the request.
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        let encoded =
            serde_json::to_vec(body).unwrap_or_else(|e| panic!("JSON body failed to encode: {}", e));
        self.body = Bytes::from(encoded);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self
    }

    /// Sets a form body on the request.
    pub fn form<T: Serialize>(mut self, body: &T) -> Self {
        let encoded = serde_urlencoded::to_string(body)
            .unwrap_or_else(|e| panic!("form body failed to encode: {}", e));
        self.body = Bytes::from(encoded);
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self
    }

    /// Sets raw body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics with the propagated error when the application hands a server
    /// error back instead of rendering it (testing mode), failing the test at
    /// the request that caused it. Use [`try_send`](Self::try_send) to
    /// inspect the error instead.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(err) => panic!("{}", err),
        }
    }

    /// Sends the request, returning a propagated server error as `Err`.
    pub async fn try_send(self) -> Result<TestResponse, PropagatedError> {
        let client = self.client;
        let mut request = http::Request::builder()
            .method(self.method)
            .uri(&self.path)
            .body(self.body)
            .unwrap_or_else(|e| panic!("invalid request path {:?}: {}", self.path, e));

        *request.headers_mut() = self.headers;
        if !request.headers().contains_key(COOKIE) {
            if let Some(cookies) = client.cookie_header() {
                request.headers_mut().insert(COOKIE, cookies);
            }
        }

        let response = client.app().dispatch(request).await?;
        client.store_cookies(response.headers());

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }
}

/// Response from a test request.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Returns the HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and printable.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the response body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Returns the response body as raw bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Deserializes the response body as JSON.
    ///
    /// # Panics
    ///
    /// Panics when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        self.try_json()
            .unwrap_or_else(|e| panic!("response body is not the expected JSON ({}): {}", e, self.text()))
    }

    /// Attempts to deserialize the response body as JSON.
    pub fn try_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
