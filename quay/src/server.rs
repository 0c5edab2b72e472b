//! HTTP/1 server loop.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::middleware::RejectedBody;
use crate::response::BoxBody;

/// Serves `app` on `addr` until Ctrl-C, then drains open connections.
pub async fn serve(app: App, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(app, listener, shutdown_signal()).await
}

/// Serves `app` on an already bound listener until `shutdown` resolves.
pub async fn serve_on(
    app: App,
    listener: TcpListener,
    shutdown: impl std::future::Future<Output = ()>,
) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    info!(
        app = %app.config().name,
        addr = %local_addr,
        routes = app.routes().len(),
        testing = app.config().testing,
        "listening"
    );

    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                debug!(%peer, "connection accepted");

                let app = app.clone();
                let service = service_fn(move |req: http::Request<Incoming>| {
                    let app = app.clone();
                    async move { Ok::<_, Infallible>(handle(app, req).await) }
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                let conn = graceful.watch(conn);
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(%peer, error = %e, "connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown requested, draining connections");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("server stopped");
    Ok(())
}

async fn handle<B>(app: App, req: http::Request<B>) -> Response<BoxBody>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = app.config().body_limit;
    let (mut parts, body) = req.into_parts();

    let body: Bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = if e.is::<LengthLimitError>() {
                Error::payload_too_large(format!("request body exceeds {} bytes", limit))
            } else {
                debug!(error = %e, "failed to read request body");
                Error::bad_request(format!("failed to read request body: {}", e))
            };
            parts.extensions.insert(RejectedBody(err));
            Bytes::new()
        }
    };

    // over the wire there is nobody to propagate to
    let response = app.respond(http::Request::from_parts(parts, body)).await;
    if let Some(err) = response
        .extensions()
        .get::<Error>()
        .filter(|err| err.is_server_error())
    {
        let trace_id = err.trace_id.as_deref().unwrap_or_default();
        error!(trace_id, error = %err, "unhandled error");
    }
    response
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Quay;
    use crate::config::AppConfig;
    use crate::router::Router;
    use http_body_util::Full;
    use hyper_util::client::legacy::Client;
    use hyper_util::rt::TokioExecutor;
    use tokio::sync::oneshot;

    async fn spawn(app: App) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            serve_on(app, listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });
        (addr, tx, handle)
    }

    async fn request(addr: SocketAddr, method: &str, path: &str, body: &'static str) -> (u16, String) {
        let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
        let req = http::Request::builder()
            .method(method)
            .uri(format!("http://{}{}", addr, path))
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        let response = client.request(req).await.unwrap();
        let status = response.status().as_u16();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    async fn traced_request(
        addr: SocketAddr,
        method: &str,
        path: &str,
        trace_id: &str,
        body: &'static str,
    ) -> (u16, http::HeaderMap, serde_json::Value) {
        let client = Client::builder(TokioExecutor::new()).build_http::<Full<Bytes>>();
        let req = http::Request::builder()
            .method(method)
            .uri(format!("http://{}{}", addr, path))
            .header("x-trace-id", trace_id)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap();
        let response = client.request(req).await.unwrap();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_serves_requests_and_shuts_down() {
        let app = Quay::new()
            .router(Router::new().get("/", |_, _, _| async { "over the wire" }))
            .build()
            .unwrap();
        let (addr, stop, handle) = spawn(app).await;

        let (status, body) = request(addr, "GET", "/", "").await;
        assert_eq!(status, 200);
        assert_eq!(body, "over the wire");

        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_renders_errors_even_in_testing_mode() {
        let app = Quay::with_config(AppConfig::testing())
            .router(Router::new().get("/fail", |_, _, _| async { Error::internal("hidden") }))
            .build()
            .unwrap();
        let (addr, stop, handle) = spawn(app).await;

        let (status, body) = request(addr, "GET", "/fail", "").await;
        assert_eq!(status, 500);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"]["message"], crate::error::MASKED_MESSAGE);

        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_enforces_body_limit() {
        let config = AppConfig {
            body_limit: 8,
            ..AppConfig::default()
        };
        let app = Quay::with_config(config)
            .router(Router::new().post("/", |_, _, _| async { "accepted" }))
            .build()
            .unwrap();
        let (addr, stop, handle) = spawn(app).await;

        let (status, _) = request(addr, "POST", "/", "this body is far too long").await;
        assert_eq!(status, 413);

        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_responses_keep_chain_headers() {
        let config = AppConfig {
            body_limit: 4,
            ..AppConfig::testing()
        };
        let app = Quay::with_config(config)
            .middleware(crate::middleware::TraceIdMiddleware::new())
            .router(
                Router::new()
                    .get("/fail", |_, _, _| async { Error::internal("hidden") })
                    .post("/upload", |_, _, _| async { "stored" }),
            )
            .build()
            .unwrap();
        let (addr, stop, handle) = spawn(app).await;

        let (status, headers, json) = traced_request(addr, "GET", "/fail", "wire-500", "").await;
        assert_eq!(status, 500);
        assert_eq!(headers["x-trace-id"], "wire-500");
        assert_eq!(json["trace_id"], "wire-500");
        assert_eq!(json["error"]["message"], crate::error::MASKED_MESSAGE);

        let (status, headers, json) =
            traced_request(addr, "POST", "/upload", "wire-413", "too long body").await;
        assert_eq!(status, 413);
        assert_eq!(headers["x-trace-id"], "wire-413");
        assert_eq!(json["trace_id"], "wire-413");

        let (status, headers, _) = traced_request(addr, "PUT", "/upload", "wire-405", "").await;
        assert_eq!(status, 405);
        assert_eq!(headers["allow"], "POST");
        assert_eq!(headers["x-trace-id"], "wire-405");

        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    struct BrokenBody;

    impl hyper::body::Body for BrokenBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<hyper::body::Frame<Bytes>, Self::Error>>> {
            std::task::Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer went away",
            ))))
        }
    }

    #[tokio::test]
    async fn test_body_read_failure_is_not_a_size_error() {
        let app = Quay::new()
            .router(Router::new().post("/", |_, _, _| async { "accepted" }))
            .build()
            .unwrap();

        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(BrokenBody)
            .unwrap();
        let response = handle(app.clone(), req).await;
        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);

        let req = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Full::new(Bytes::from(vec![b'x'; app.config().body_limit + 1])))
            .unwrap();
        let response = handle(app, req).await;
        assert_eq!(response.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }
}
