use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use volley_core::{ConfigFile, Interrupt, RunScope, Runner, runner};

use super::AppState;
use super::protocol::{ClientMessage, ServerFrame};

/// Run started by this connection.
struct ActiveRun {
    scope: RunScope,
    task: JoinHandle<()>,
}

/// Drives one websocket connection: at most one run at a time, every outgoing frame goes
/// through a single writer task.
pub(crate) async fn handle(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame.to_text() {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel::<()>();
    let mut active: Option<ActiveRun> = None;

    loop {
        tokio::select! {
            biased;
            Some(()) = finished_rx.recv() => {
                active = None;
            }
            incoming = stream.next() => {
                let Some(Ok(msg)) = incoming else {
                    break;
                };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Binary(_) => {
                        let _ = tx.send(ServerFrame::error("expected a text frame"));
                        continue;
                    }
                };

                match ClientMessage::parse(text.as_str()) {
                    Ok(ClientMessage::Run { data }) => {
                        if active.is_some() {
                            let _ = tx.send(ServerFrame::error("a run is already in progress"));
                            continue;
                        }
                        active = start_run(*data, &state, &tx, &finished_tx);
                    }
                    Ok(ClientMessage::Cancel) => match &active {
                        Some(run) => {
                            tracing::info!("cancel requested");
                            run.scope.cancel();
                        }
                        None => {
                            let _ = tx.send(ServerFrame::error("no active run"));
                        }
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "malformed client frame");
                        let _ = tx.send(ServerFrame::error(format!("invalid message: {err}")));
                    }
                }
            }
        }
    }

    if let Some(run) = active.take() {
        tracing::info!("connection closed, canceling active run");
        run.scope.cancel();
        let _ = run.task.await;
    }
    drop(tx);
    let _ = writer.await;
}

/// Validates `config` and spawns the run. Returns `None` (after sending an error frame) when the
/// config is rejected.
fn start_run(
    config: ConfigFile,
    state: &AppState,
    tx: &mpsc::UnboundedSender<ServerFrame>,
    finished_tx: &mpsc::UnboundedSender<()>,
) -> Option<ActiveRun> {
    let spec = match config.into_run_spec() {
        Ok(spec) => spec,
        Err(err) => {
            let _ = tx.send(ServerFrame::error(err));
            return None;
        }
    };

    let progress_tx = tx.clone();
    let runner = Runner::new()
        .with_policy(state.policy.clone())
        .with_progress(Arc::new(move |p| {
            let _ = progress_tx.send(ServerFrame::progress(&p));
        }));

    let scope = RunScope::new();
    let task = tokio::spawn({
        let scope = scope.clone();
        let tx = tx.clone();
        let finished_tx = finished_tx.clone();
        async move {
            let frame = match runner.run(&scope, spec).await {
                Ok(report) => ServerFrame::Done {
                    data: Box::new(report),
                },
                Err(runner::Error::Canceled(_)) => ServerFrame::error(Interrupt::Canceled),
                Err(err) => {
                    tracing::warn!(error = %err, "run failed");
                    ServerFrame::error(err)
                }
            };
            // Idle again before the client can observe the terminal frame.
            let _ = finished_tx.send(());
            let _ = tx.send(frame);
        }
    });

    Some(ActiveRun { scope, task })
}
