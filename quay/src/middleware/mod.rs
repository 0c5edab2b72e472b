//! Request middleware.
//!
//! Middlewares run in registration order around the router. Each one gets the
//! request, the request context and a [`Next`] continuation for the rest of
//! the chain.

mod request_log;
mod trace_id;

pub use request_log::RequestLogMiddleware;
pub use trace_id::TraceIdMiddleware;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Response;

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::Request;
use crate::response::{BoxBody, IntoResponse};
use crate::router::Router;
use crate::state::AppState;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        req: Request,
        ctx: &'a RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response<BoxBody>>;
}

/// Marks a request whose body could not be read.
///
/// The endpoint answers it with the carried error, so the rejection still
/// passes through every middleware.
#[derive(Debug, Clone)]
pub(crate) struct RejectedBody(pub(crate) Error);

/// The innermost step of the chain: body checks, then the router.
pub(crate) struct Endpoint {
    pub(crate) router: Router,
    pub(crate) state: Arc<AppState>,
    pub(crate) body_limit: usize,
}

impl Endpoint {
    async fn call(&self, req: Request) -> Response<BoxBody> {
        if let Some(RejectedBody(err)) = req.extensions().get::<RejectedBody>() {
            return err.clone().into_response();
        }
        if req.body().len() > self.body_limit {
            return Error::payload_too_large(format!(
                "request body exceeds {} bytes",
                self.body_limit
            ))
            .into_response();
        }
        self.router.handle(req, &self.state).await
    }
}

pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    endpoint: &'a Endpoint,
    ctx: &'a RequestContext,
}

impl<'a> Next<'a> {
    pub async fn run(self, req: Request) -> Response<BoxBody> {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middlewares: rest,
                    endpoint: self.endpoint,
                    ctx: self.ctx,
                };
                current.handle(req, self.ctx, next).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

#[derive(Default)]
pub struct MiddlewareStack {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub(crate) async fn execute(
        &self,
        req: Request,
        endpoint: &Endpoint,
        ctx: &RequestContext,
    ) -> Response<BoxBody> {
        let next = Next {
            middlewares: &self.middlewares,
            endpoint,
            ctx,
        };
        next.run(req).await
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}
