use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::Response;
use tracing::{error, warn};

use crate::config::{AppConfig, ConfigError};
use crate::context::RequestContext;
use crate::error::{Error, PropagatedError};
use crate::handler::Request;
use crate::middleware::{Endpoint, Middleware, MiddlewareStack};
use crate::response::BoxBody;
use crate::router::Router;
use crate::server::serve;
use crate::state::AppState;
use crate::testing::TestClient;

/// Builder for a Quay application.
///
/// ```
/// use quay::prelude::*;
///
/// let app = Quay::with_config(AppConfig::testing())
///     .router(Router::new().get("/", |_, _, _| async { "hi" }))
///     .build()
///     .unwrap();
/// assert!(app.config().testing);
/// ```
pub struct Quay {
    config: AppConfig,
    router: Router,
    state: AppState,
    middlewares: MiddlewareStack,
}

impl Quay {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            state: AppState::new(),
            middlewares: MiddlewareStack::new(),
        }
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the testing flag, keeping the rest of the configuration.
    pub fn testing(mut self, testing: bool) -> Self {
        self.config.testing = testing;
        self
    }

    pub fn current_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub fn state<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.state.insert(value);
        self
    }

    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.add(middleware);
        self
    }

    /// Validates the configuration and freezes the application.
    pub fn build(self) -> Result<App, ConfigError> {
        self.config.validate()?;

        let mut state = self.state;
        state.insert(self.config.clone());

        Ok(App {
            inner: Arc::new(AppInner {
                endpoint: Endpoint {
                    router: self.router,
                    state: Arc::new(state),
                    body_limit: self.config.body_limit,
                },
                middlewares: self.middlewares,
                config: self.config,
                open_clients: AtomicUsize::new(0),
            }),
        })
    }

    /// Builds the application and serves it until Ctrl-C.
    pub async fn listen(self, addr: &str) -> std::io::Result<()> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let app = self
            .build()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        serve(app, addr).await
    }
}

impl Default for Quay {
    fn default() -> Self {
        Self::new()
    }
}

struct AppInner {
    config: AppConfig,
    endpoint: Endpoint,
    middlewares: MiddlewareStack,
    open_clients: AtomicUsize,
}

/// A built application. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn state(&self) -> &AppState {
        &self.inner.endpoint.state
    }

    pub fn routes(&self) -> Vec<(http::Method, String)> {
        self.inner.endpoint.router.routes()
    }

    /// Opens an in-process test client bound to this application.
    pub fn test_client(&self) -> TestClient {
        TestClient::new(self.clone())
    }

    /// Number of test clients currently holding this application.
    pub fn open_clients(&self) -> usize {
        self.inner.open_clients.load(Ordering::SeqCst)
    }

    pub(crate) fn acquire_client(&self) -> usize {
        self.inner.open_clients.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn release_client(&self) -> usize {
        let previous = self.inner.open_clients.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "test client released twice");
        previous - 1
    }

    /// Runs one request through the middleware chain and router.
    ///
    /// Returns `Err` only when the result is a server error and the
    /// configuration propagates exceptions (testing mode by default); the
    /// error then carries the request's trace id and the unmasked message.
    pub async fn dispatch(&self, req: Request) -> Result<Response<BoxBody>, PropagatedError> {
        let response = self.respond(req).await;

        let Some(err) = response.extensions().get::<Error>() else {
            return Ok(response);
        };
        if !err.is_server_error() {
            return Ok(response);
        }

        let trace_id = err.trace_id.as_deref().unwrap_or_default();
        if self.config().propagate_exceptions() {
            warn!(trace_id, error = %err, "propagating unhandled error");
            return Err(PropagatedError(err.clone()));
        }

        error!(trace_id, error = %err, "unhandled error");
        Ok(response)
    }

    /// Runs one request and always renders the outcome.
    ///
    /// Any error response, whether from the router or a middleware, is
    /// re-rendered with the request's trace id and masked outside debug mode.
    /// Headers added along the chain are kept.
    pub(crate) async fn respond(&self, mut req: Request) -> Response<BoxBody> {
        let ctx = RequestContext::from_headers(req.headers());
        req.extensions_mut().insert(ctx.clone());

        let response = self
            .inner
            .middlewares
            .execute(req, &self.inner.endpoint, &ctx)
            .await;

        match response.extensions().get::<Error>().cloned() {
            Some(err) => err.render_into(response, &ctx.trace_id, self.config().debug),
            None => response,
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.inner.config)
            .field("routes", &self.inner.endpoint.router.len())
            .field("middlewares", &self.inner.middlewares.len())
            .field("open_clients", &self.open_clients())
            .finish()
    }
}
