use http::Response;
use http::header::HeaderValue;

use crate::context::{RequestContext, TRACE_ID_HEADER};
use crate::handler::Request;
use crate::response::BoxBody;

use super::{BoxFuture, Middleware, Next};

/// Echoes the request's trace id in the `x-trace-id` response header.
///
/// The id itself is chosen by the dispatcher: the caller's `x-trace-id` when
/// present, a fresh UUID otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceIdMiddleware;

impl TraceIdMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for TraceIdMiddleware {
    fn handle<'a>(
        &'a self,
        req: Request,
        ctx: &'a RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response<BoxBody>> {
        Box::pin(async move {
            let mut response = next.run(req).await;
            if let Ok(value) = HeaderValue::from_str(&ctx.trace_id) {
                response.headers_mut().insert(TRACE_ID_HEADER, value);
            }
            response
        })
    }
}
