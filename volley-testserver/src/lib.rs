//! Local HTTP target for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

const DEFAULT_SLOW_MS: u64 = 50;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    tagged_posts: AtomicU64,
    ping_bodies: AtomicU64,
}

/// Request counters shared between the server task and the test.
#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    counters: Arc<Counters>,
}

impl TestServerStats {
    /// Every request that reached the router, pings included.
    pub fn requests_total(&self) -> u64 {
        self.counters.requests.load(Ordering::Relaxed)
    }

    /// `/echo` requests carrying `x-test: 1`.
    pub fn saw_post_header(&self) -> u64 {
        self.counters.tagged_posts.load(Ordering::Relaxed)
    }

    /// `/echo` requests whose body was exactly `ping`.
    pub fn saw_post_body(&self) -> u64 {
        self.counters.ping_bodies.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct TestServerUrls {
    base_url: String,
    /// `GET`, answers `Hello World!`.
    pub hello: String,
    /// `POST`, echoes the request body.
    pub echo: String,
    /// `GET`, answers after [`DEFAULT_SLOW_MS`] unless `?ms=` says otherwise.
    pub slow: String,
}

impl TestServerUrls {
    fn new(base_url: String) -> Self {
        Self {
            hello: format!("{base_url}/hello"),
            echo: format!("{base_url}/echo"),
            slow: format!("{base_url}/slow"),
            base_url,
        }
    }

    /// URL answering with the given status code.
    pub fn status(&self, code: u16) -> String {
        format!("{}/status/{code}", self.base_url)
    }

    /// URL that answers after sleeping for `ms` milliseconds.
    pub fn slow_ms(&self, ms: u64) -> String {
        format!("{}?ms={ms}", self.slow)
    }
}

async fn count_requests(
    State(stats): State<TestServerStats>,
    request: Request,
    next: Next,
) -> Response {
    stats.counters.requests.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

#[derive(Debug, Deserialize)]
struct SlowQuery {
    ms: Option<u64>,
}

async fn slow(Query(query): Query<SlowQuery>) -> &'static str {
    sleep(Duration::from_millis(query.ms.unwrap_or(DEFAULT_SLOW_MS))).await;
    "slow"
}

async fn status(Path(code): Path<u16>) -> (StatusCode, &'static str) {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, "status"),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status code"),
    }
}

async fn echo(State(stats): State<TestServerStats>, headers: HeaderMap, body: Bytes) -> Bytes {
    if headers.get("x-test").and_then(|v| v.to_str().ok()) == Some("1") {
        stats.counters.tagged_posts.fetch_add(1, Ordering::Relaxed);
    }
    if body.as_ref() == b"ping" {
        stats.counters.ping_bodies.fetch_add(1, Ordering::Relaxed);
    }
    body
}

fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route("/hello", get(|| async { "Hello World!" }))
        .route("/slow", get(slow))
        .route("/status/{code}", get(status))
        .route("/echo", post(echo))
        .layer(middleware::from_fn_with_state(stats.clone(), count_requests))
        .with_state(stats)
}

/// A target server bound to an ephemeral loopback port. Aborted on drop unless shut down
/// gracefully first.
pub struct TestServer {
    urls: TestServerUrls,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            urls: TestServerUrls::new(format!("http://{addr}")),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn urls(&self) -> &TestServerUrls {
        &self.urls
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
