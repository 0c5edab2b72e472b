//! The client fixture: a freshly built, testing-mode application per test.
//!
//! Every call builds a new [`App`](crate::app::App) from an explicit
//! [`AppConfig`], so nothing leaks between tests. The returned
//! [`TestClient`] is released when it goes out of scope, whether the test
//! body finishes or panics.
//!
//! ```ignore
//! // tests/common/mod.rs
//! pub fn client() -> TestClient {
//!     quay::testing::client(notes::create_app).expect("application failed to start")
//! }
//!
//! // tests/notes.rs
//! #[tokio::test]
//! async fn lists_notes() {
//!     let client = common::client();
//!     assert_eq!(client.get("/api/notes").send().await.status(), StatusCode::OK);
//! }
//! ```

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use crate::app::Quay;
use crate::config::{AppConfig, ConfigError};

use super::TestClient;

/// What an application factory may return.
pub trait IntoQuay {
    fn into_quay(self) -> Result<Quay, FixtureError>;
}

impl IntoQuay for Quay {
    fn into_quay(self) -> Result<Quay, FixtureError> {
        Ok(self)
    }
}

impl<E: fmt::Display> IntoQuay for Result<Quay, E> {
    fn into_quay(self) -> Result<Quay, FixtureError> {
        self.map_err(|e| FixtureError::Factory(e.to_string()))
    }
}

/// Fixture setup failures. The test body never runs when one occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureError {
    /// The application factory failed.
    Factory(String),
    /// The application's configuration is unusable.
    Config(ConfigError),
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureError::Factory(message) => {
                write!(f, "fixture setup failed: application factory: {}", message)
            }
            FixtureError::Config(err) => write!(f, "fixture setup failed: {}", err),
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixtureError::Factory(_) => None,
            FixtureError::Config(err) => Some(err),
        }
    }
}

impl From<ConfigError> for FixtureError {
    fn from(err: ConfigError) -> Self {
        FixtureError::Config(err)
    }
}

/// Prepares a testing-mode application and opens a client on it.
#[derive(Debug, Clone)]
pub struct ClientFixture {
    config: AppConfig,
}

impl ClientFixture {
    /// Starts from [`AppConfig::testing`].
    pub fn new() -> Self {
        Self {
            config: AppConfig::testing(),
        }
    }

    /// Adjusts the configuration handed to the factory.
    ///
    /// The testing flag is forced back on after the factory runs.
    pub fn configure(mut self, f: impl FnOnce(&mut AppConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Builds the application with `factory` and opens a client on it.
    pub fn setup<F, R>(self, factory: F) -> Result<TestClient, FixtureError>
    where
        F: FnOnce(AppConfig) -> R,
        R: IntoQuay,
    {
        let quay = factory(self.config).into_quay()?.testing(true);
        let app = quay.build()?;
        debug!(app = %app.config().name, routes = app.routes().len(), "fixture ready");
        Ok(app.test_client())
    }
}

impl Default for ClientFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for `ClientFixture::new().setup(factory)`.
pub fn client<F, R>(factory: F) -> Result<TestClient, FixtureError>
where
    F: FnOnce(AppConfig) -> R,
    R: IntoQuay,
{
    ClientFixture::new().setup(factory)
}

/// Runs `body` with a fixture client and returns what it returns.
///
/// The client is released when `body`'s future completes or unwinds, unless
/// `body` hands the client (or a clone of it) back inside `T`. Release then
/// happens when the caller drops that value, and a warning is logged.
pub async fn with_client<F, R, B, Fut, T>(factory: F, body: B) -> Result<T, FixtureError>
where
    F: FnOnce(AppConfig) -> R,
    R: IntoQuay,
    B: FnOnce(TestClient) -> Fut,
    Fut: Future<Output = T>,
{
    let client = client(factory)?;
    let app = client.app().clone();

    let output = body(client).await;
    let open = app.open_clients();
    if open > 0 {
        warn!(app = %app.config().name, open, "test client outlived its with_client body");
    }
    Ok(output)
}
