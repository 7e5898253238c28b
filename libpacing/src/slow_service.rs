//! A deliberately slow HTTP server: every page drips a fixed payload at `bps` bits per second.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::stream::{self, StreamExt};
use plugin_core::rate::{byte_delay, DEFAULT_BPS, MIN_BPS};
use plugin_core::{CancelSignal, ContextPlugin, Logger, PluginConfig, PluginContext, PluginError};
use tokio::net::TcpListener;

pub const PLUGIN_NAME: &str = "live_stream (slow HTTP server)";

pub const DEFAULT_PORT: u16 = 8081;

/// Sent immediately when a page is requested.
pub const INTRO: &[u8] = b"<html><body style='font-family:monospace;background:#000;color:#0f0;'><pre>LOADING...";

/// Dripped one byte at a time after [`INTRO`].
pub const PAYLOAD: &[u8] = b" THIS_IS_A_SLOW_STREAM ";

#[derive(Clone)]
struct StreamState {
    delay: Duration,
    cancel: CancelSignal,
    logger: Arc<dyn Logger>,
}

/// Routes of the slow service. `/favicon.ico` is a plain 404, every other path streams.
pub fn router(bps: i64, logger: Arc<dyn Logger>, cancel: CancelSignal) -> Router {
    let state = StreamState {
        delay: byte_delay(bps),
        cancel,
        logger,
    };
    Router::new()
        .route("/favicon.ico", get(not_found))
        .route("/", get(slow_page))
        .route("/*path", get(slow_page))
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn slow_page(State(state): State<StreamState>) -> Response {
    state.logger.debug("live_stream: client connected");
    let intro = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(INTRO)) });
    // A client going away just drops this stream; nothing to report.
    let drip = stream::unfold(0usize, move |index| {
        let state = state.clone();
        async move {
            let byte = *PAYLOAD.get(index)?;
            if index > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(state.delay) => {}
                    _ = state.cancel.cancelled() => return None,
                }
            }
            Some((Ok::<_, Infallible>(Bytes::copy_from_slice(&[byte])), index + 1))
        }
    });

    (
        [(header::CONTENT_TYPE, "text/html")],
        Body::from_stream(intro.chain(drip)),
    )
        .into_response()
}

/// Serves until `cancel` fires. Open streams end at their next per-byte delay.
pub async fn serve(listener: TcpListener, bps: i64, logger: Arc<dyn Logger>, cancel: CancelSignal) -> io::Result<()> {
    let app = router(bps, logger, cancel.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[derive(Debug, Default)]
pub struct SlowService;

impl SlowService {
    fn port(ctx: &PluginContext) -> u16 {
        match ctx.config().get_i64("port") {
            None => DEFAULT_PORT,
            Some(port) => match u16::try_from(port) {
                Ok(port) if port > 0 => port,
                _ => {
                    ctx.logger()
                        .warn(&format!("live_stream: invalid port {}, using {}", port, DEFAULT_PORT));
                    DEFAULT_PORT
                }
            },
        }
    }
}

/// Configured `bps`, clamped to the minimum with a warning when it is not positive.
fn configured_bps(config: &PluginConfig, logger: &dyn Logger) -> i64 {
    let bps = config.get_i64("bps").unwrap_or(DEFAULT_BPS);
    if bps < MIN_BPS {
        logger.warn(&format!("live_stream: bps must be positive (got {}), using {}", bps, MIN_BPS));
        return MIN_BPS;
    }
    bps
}

impl ContextPlugin for SlowService {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn requires_process(&self) -> bool {
        false
    }

    fn run(self: Box<Self>, ctx: &PluginContext) -> Result<(), PluginError> {
        let port = Self::port(ctx);
        let bps = configured_bps(ctx.config(), ctx.logger().as_ref());
        let logger = Arc::clone(ctx.logger());
        let cancel = ctx.cancel().clone();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        runtime.block_on(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = TcpListener::bind(addr).await?;
            logger.info(&format!(
                "Live stream server running at http://localhost:{} (bps={})",
                port, bps
            ));
            serve(listener, bps, Arc::clone(&logger), cancel).await?;
            logger.info("Live stream server stopped.");
            Ok::<_, io::Error>(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logger::{LogLevel, LogWriter, MemoryLogDestination};
    use std::time::Instant;
    use tower::ServiceExt;

    fn test_logger() -> Arc<dyn Logger> {
        Arc::new(LogWriter::new(LogLevel::Info, Arc::new(MemoryLogDestination::new())))
    }

    async fn start(bps: i64) -> (SocketAddr, CancelSignal, tokio::task::JoinHandle<io::Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancelSignal::new();
        let server = tokio::spawn(serve(listener, bps, test_logger(), cancel.clone()));
        (addr, cancel, server)
    }

    #[test]
    fn non_positive_rate_is_clamped_with_a_warning() {
        let memory = Arc::new(MemoryLogDestination::new());
        let logger = LogWriter::new(LogLevel::Info, memory.clone());

        assert_eq!(configured_bps(&PluginConfig::new().with("bps", 0), &logger), 1);
        assert!(memory.contains("bps must be positive (got 0)"));

        assert_eq!(configured_bps(&PluginConfig::new().with("bps", 64), &logger), 64);
        assert_eq!(configured_bps(&PluginConfig::new(), &logger), DEFAULT_BPS);
        assert_eq!(memory.messages().len(), 1);
    }

    #[tokio::test]
    async fn favicon_is_not_found() {
        let app = router(1, test_logger(), CancelSignal::new());
        let response = app
            .oneshot(axum::http::Request::get("/favicon.ico").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn any_other_path_is_html() {
        let app = router(1, test_logger(), CancelSignal::new());
        let response = app
            .oneshot(axum::http::Request::get("/some/page").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn payload_is_dripped_at_the_configured_rate() {
        let (addr, cancel, server) = start(800).await;

        let started = Instant::now();
        let body = reqwest::get(format!("http://{}/", addr)).await.unwrap().bytes().await.unwrap();
        let elapsed = started.elapsed();

        let mut expected = INTRO.to_vec();
        expected.extend_from_slice(PAYLOAD);
        assert_eq!(body.as_ref(), expected.as_slice());
        let minimum = byte_delay(800) * (PAYLOAD.len() as u32 - 1);
        assert!(elapsed >= minimum - Duration::from_millis(5), "{elapsed:?} < {minimum:?}");

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn client_disconnect_does_not_take_the_server_down() {
        let (addr, cancel, server) = start(8).await;

        let mut response = reqwest::get(format!("http://{}/stream", addr)).await.unwrap();
        let first = response.chunk().await.unwrap().unwrap();
        assert!(first.starts_with(b"<html>"));
        drop(response);

        let status = reqwest::get(format!("http://{}/favicon.ico", addr)).await.unwrap().status();
        assert_eq!(status.as_u16(), 404);
        assert!(!server.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap().unwrap();
    }
}
