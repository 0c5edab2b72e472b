pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod observability;
pub mod response;
pub mod router;
pub mod server;
pub mod state;
pub mod testing;

pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::app::{App, Quay};
    pub use crate::config::AppConfig;
    pub use crate::context::RequestContext;
    pub use crate::error::{Error, IntoApiError, Result};
    pub use crate::extract::{
        Context, Form, FromRequest, FromRequestParts, Headers, Json, Path, PathParams, Query,
        State,
    };
    pub use crate::handler::Request;
    pub use crate::middleware::{
        Middleware, Next, RequestLogMiddleware, TraceIdMiddleware,
    };
    pub use crate::observability::TracingConfig;
    pub use crate::response::IntoResponse;
    pub use crate::router::Router;
    pub use crate::state::AppState;

    pub use http::{Method, StatusCode};
    pub use serde::{Deserialize, Serialize};
}
