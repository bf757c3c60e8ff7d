use std::process::Stdio;
use std::time::Duration;

use anyhow::Context as _;
use futures_util::{SinkExt as _, Stream, StreamExt as _};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::{self, Message};
use volley_testserver::TestServer;

const TOKEN: &str = "e2e-secret";

struct ServeProcess {
    child: tokio::process::Child,
    url: String,
}

async fn spawn_serve() -> anyhow::Result<ServeProcess> {
    let exe = env!("CARGO_BIN_EXE_volley");
    let mut child = tokio::process::Command::new(exe)
        .args(["serve", "--bind", "127.0.0.1:0", "--token", TOKEN])
        .env_remove("VOLLEY_TOKEN")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("spawn volley serve")?;

    let stderr = child.stderr.take().context("missing stderr")?;
    let mut lines = BufReader::new(stderr).lines();

    let url = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(line) = lines.next_line().await? {
            if let Some(v) = line.strip_prefix("listening=") {
                return Ok(v.trim().to_string());
            }
        }
        anyhow::bail!("volley serve exited before printing its url")
    })
    .await
    .context("timed out waiting for listening= line")??;

    // Keep draining so log output never blocks the server.
    tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    Ok(ServeProcess { child, url })
}

async fn next_frame<S>(ws: &mut S) -> anyhow::Result<Value>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .context("timed out waiting for a frame")?
            .context("socket closed")?
            .context("read frame")?;
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).context("parse frame");
        }
    }
}

fn run_frame(url: &str, runner: Value) -> Message {
    Message::Text(
        json!({
            "action": "run",
            "data": { "request": { "url": url }, "runner": runner }
        })
        .to_string()
        .into(),
    )
}

#[tokio::test]
async fn e2e_serve_streams_progress_then_done() -> anyhow::Result<()> {
    let target = TestServer::start().await.context("start test server")?;
    let mut serve = spawn_serve().await?;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("{}?access_token={TOKEN}", serve.url))
        .await
        .context("connect websocket")?;

    ws.send(run_frame(
        &target.urls().hello,
        json!({ "requests": 4, "concurrency": 2 }),
    ))
    .await
    .context("send run")?;

    let mut progress = 0;
    let done = loop {
        let frame = next_frame(&mut ws).await?;
        match frame["event"].as_str() {
            Some("progress") => {
                anyhow::ensure!(frame["data"].is_string(), "{frame}");
                progress += 1;
            }
            Some("done") => break frame,
            _ => anyhow::bail!("unexpected frame: {frame}"),
        }
    };

    anyhow::ensure!(progress >= 1, "expected at least one progress frame");
    anyhow::ensure!(done["data"]["metrics"]["RequestCount"] == 4, "{done}");
    anyhow::ensure!(done["data"]["tests"]["pass"] == true, "{done}");

    // The connection is idle again and accepts another run.
    ws.send(run_frame(
        &target.urls().hello,
        json!({ "requests": 2, "concurrency": 1 }),
    ))
    .await
    .context("send second run")?;
    let done = loop {
        let frame = next_frame(&mut ws).await?;
        if frame["event"] != "progress" {
            break frame;
        }
    };
    anyhow::ensure!(done["event"] == "done", "{done}");
    anyhow::ensure!(done["data"]["metrics"]["RequestCount"] == 2, "{done}");

    let _ = ws.close(None).await;
    let _ = serve.child.kill().await;
    target.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn e2e_serve_cancel_and_protocol_errors() -> anyhow::Result<()> {
    let target = TestServer::start().await.context("start test server")?;
    let mut serve = spawn_serve().await?;

    let mut request = serve
        .url
        .as_str()
        .into_client_request()
        .context("build request")?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {TOKEN}").parse().context("header value")?,
    );
    let (mut ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .context("connect websocket")?;

    ws.send(Message::Text(r#"{"action":"cancel"}"#.into()))
        .await
        .context("send cancel")?;
    let frame = next_frame(&mut ws).await?;
    anyhow::ensure!(frame == json!({"event":"error","error":"no active run"}), "{frame}");

    ws.send(Message::Text(r#"{"action":"jump"}"#.into()))
        .await
        .context("send junk")?;
    let frame = next_frame(&mut ws).await?;
    anyhow::ensure!(
        frame["error"]
            .as_str()
            .is_some_and(|e| e.starts_with("invalid message")),
        "{frame}"
    );

    ws.send(run_frame(
        "ftp://localhost:1/",
        json!({ "requests": 1, "concurrency": 1 }),
    ))
    .await
    .context("send invalid run")?;
    let frame = next_frame(&mut ws).await?;
    anyhow::ensure!(
        frame["error"]
            .as_str()
            .is_some_and(|e| e.contains("unsupported scheme")),
        "{frame}"
    );

    let slow = target.urls().slow_ms(200);
    ws.send(run_frame(
        &slow,
        json!({ "requests": -1, "concurrency": 2, "globalTimeout": "30s" }),
    ))
    .await
    .context("send run")?;
    ws.send(run_frame(&slow, json!({ "requests": 1, "concurrency": 1 })))
        .await
        .context("send second run")?;

    let frame = next_frame(&mut ws).await?;
    anyhow::ensure!(
        frame == json!({"event":"error","error":"a run is already in progress"}),
        "{frame}"
    );

    let frame = next_frame(&mut ws).await?;
    anyhow::ensure!(frame["event"] == "progress", "{frame}");

    ws.send(Message::Text(r#"{"action":"cancel"}"#.into()))
        .await
        .context("send cancel")?;

    let terminal = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame = next_frame(&mut ws).await?;
            if frame["event"] != "progress" {
                return Ok::<_, anyhow::Error>(frame);
            }
        }
    })
    .await
    .context("run did not stop after cancel")??;
    anyhow::ensure!(
        terminal == json!({"event":"error","error":"context canceled"}),
        "{terminal}"
    );

    let _ = ws.close(None).await;
    let _ = serve.child.kill().await;
    target.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn e2e_serve_rejects_bad_token() -> anyhow::Result<()> {
    let mut serve = spawn_serve().await?;

    let result = tokio_tungstenite::connect_async(format!("{}?access_token=wrong", serve.url)).await;
    anyhow::ensure!(result.is_err(), "connection with a wrong token must be rejected");

    let result = tokio_tungstenite::connect_async(serve.url.as_str()).await;
    anyhow::ensure!(result.is_err(), "connection without a token must be rejected");

    let _ = serve.child.kill().await;
    Ok(())
}
