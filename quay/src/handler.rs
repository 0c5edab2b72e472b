use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::Response;

use crate::error::Error;
use crate::extract::PathParams;
use crate::response::{BoxBody, IntoResponse};
use crate::state::AppState;

/// A request whose body has already been read into memory.
pub type Request = http::Request<Bytes>;

pub(crate) type HandlerFuture = Pin<Box<dyn Future<Output = Response<BoxBody>> + Send>>;

pub(crate) type HandlerFn =
    Arc<dyn Fn(Request, PathParams, Arc<AppState>) -> HandlerFuture + Send + Sync>;

/// Boxes a user handler into the router's uniform shape.
pub(crate) fn boxed<F, Fut, Out>(handler: F) -> HandlerFn
where
    F: Fn(Request, PathParams, Arc<AppState>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoResponse + 'static,
{
    Arc::new(move |req: Request, params: PathParams, state: Arc<AppState>| {
        let fut = handler(req, params, state);
        Box::pin(async move { fut.await.into_response() }) as HandlerFuture
    })
}

/// Runs a handler on its own task so a panic becomes a 500 error.
pub(crate) async fn run_guarded(fut: HandlerFuture) -> Response<BoxBody> {
    match tokio::spawn(fut).await {
        Ok(response) => response,
        Err(err) if err.is_panic() => {
            let message = panic_message(err.into_panic());
            tracing::error!(panic = %message, "handler panicked");
            Error::internal(format!("handler panicked: {}", message)).into_response()
        }
        Err(_) => Error::internal("handler task was cancelled").into_response(),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Ok(message) = payload.downcast::<String>() {
        *message
    } else {
        "non-string panic payload".to_string()
    }
}
