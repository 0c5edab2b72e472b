use std::time::{Duration, Instant};

use http::HeaderMap;

/// Header carrying the request's trace id, in both directions.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Per-request metadata created by the dispatcher before any middleware runs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub start_time: Instant,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::with_trace_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            start_time: Instant::now(),
        }
    }

    /// Reuses the caller's `x-trace-id` when it is present and non-empty.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(Self::with_trace_id)
            .unwrap_or_default()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
