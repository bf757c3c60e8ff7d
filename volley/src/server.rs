use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use subtle::ConstantTimeEq as _;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use volley_core::FieldPolicy;

use crate::cli::ServeArgs;
use crate::run_error::RunError;

mod protocol;
mod session;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub token: Option<String>,
    pub policy: FieldPolicy,
}

/// Websocket control plane. Each connection drives its own runs; nothing is shared between
/// connections.
#[derive(Debug)]
pub struct Server {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl Server {
    pub async fn start(cfg: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(cfg.bind_addr)
            .await
            .with_context(|| format!("failed to bind control plane: {}", cfg.bind_addr))?;
        let addr = listener
            .local_addr()
            .context("failed to resolve control plane address")?;

        let state = Arc::new(AppState {
            token: cfg.token,
            policy: cfg.policy,
        });
        let app = router(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                tracing::warn!(error = %err, "control plane stopped");
            }
        });

        tracing::info!(%addr, "control plane listening");
        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/run", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let _ = self.task.await;
    }
}

/// `volley serve`: runs until Ctrl-C.
pub async fn serve(args: ServeArgs) -> Result<(), RunError> {
    let policy = FieldPolicy::new(&args.allowed_fields)
        .context("invalid --allow-field pattern")
        .map_err(RunError::InvalidInput)?;
    if args.token.is_none() {
        tracing::warn!("no access token configured, accepting unauthenticated connections");
    }

    let server = Server::start(ServerConfig {
        bind_addr: args.bind,
        token: args.token,
        policy,
    })
    .await
    .map_err(RunError::RuntimeError)?;
    eprintln!("listening={}", server.url());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")
        .map_err(RunError::RuntimeError)?;
    tracing::info!("shutting down");
    server.shutdown().await;
    Ok(())
}

#[derive(Debug)]
pub(crate) struct AppState {
    token: Option<String>,
    pub(crate) policy: FieldPolicy,
}

impl AppState {
    /// Token from `?access_token=` or `Authorization: Bearer`, compared in constant time.
    fn authorized(&self, query_token: Option<&str>, headers: &HeaderMap) -> bool {
        let Some(expected) = self.token.as_deref() else {
            return true;
        };
        let presented = query_token.or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
        });
        match presented {
            Some(token) => token.as_bytes().ct_eq(expected.as_bytes()).into(),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    access_token: Option<String>,
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.authorized(query.access_token.as_deref(), &headers) {
        tracing::warn!("rejected connection with invalid access token");
        return (StatusCode::UNAUTHORIZED, "invalid access token").into_response();
    }
    ws.on_upgrade(move |socket| session::handle(socket, state))
}
