use http::Response;
use tracing::{Instrument, info, info_span, warn};

use crate::context::RequestContext;
use crate::handler::Request;
use crate::response::BoxBody;

use super::{BoxFuture, Middleware, Next};

/// One `request` span per request, closed by a completion event.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogMiddleware;

impl RequestLogMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLogMiddleware {
    fn handle<'a>(
        &'a self,
        req: Request,
        ctx: &'a RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response<BoxBody>> {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            trace_id = %ctx.trace_id,
        );

        Box::pin(
            async move {
                let response = next.run(req).await;
                let status = response.status().as_u16();
                let duration_ms = ctx.elapsed().as_millis() as u64;

                if response.status().is_server_error() {
                    warn!(status, duration_ms, "request failed");
                } else {
                    info!(status, duration_ms, "request completed");
                }

                response
            }
            .instrument(span),
        )
    }
}
