use std::process::{Command, Output};

use anyhow::Context as _;
use volley_testserver::TestServer;

fn status_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn ensure_code(out: &Output, expected: i32) -> anyhow::Result<()> {
    anyhow::ensure!(
        status_code(out.status) == expected,
        "expected exit code {expected}, got {}\nstdout:\n{}\nstderr:\n{}",
        status_code(out.status),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    Ok(())
}

async fn volley(args: Vec<String>) -> anyhow::Result<Output> {
    let exe = env!("CARGO_BIN_EXE_volley");
    tokio::task::spawn_blocking(move || Command::new(exe).args(&args).output())
        .await
        .context("spawn_blocking join")?
        .context("run volley binary")
}

#[test]
fn help_exits_0() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_volley"))
        .arg("--help")
        .output()
        .context("run volley binary")?;
    ensure_code(&out, 0)
}

#[test]
fn invalid_flags_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_volley"))
        .args(["run", "--url", "http://localhost:1/", "--interval", "10x"])
        .output()
        .context("run volley binary")?;
    ensure_code(&out, 30)
}

#[test]
fn invalid_run_spec_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_volley"))
        .args([
            "run",
            "--url",
            "ftp://localhost:1/",
            "--requests",
            "2",
            "--concurrency",
            "5",
        ])
        .output()
        .context("run volley binary")?;
    ensure_code(&out, 30)?;

    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::ensure!(stderr.contains("unsupported scheme"), "stderr:\n{stderr}");
    anyhow::ensure!(
        stderr.contains("concurrency: must not exceed requests"),
        "stderr:\n{stderr}"
    );
    Ok(())
}

#[test]
fn missing_config_file_exit_30() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_volley"))
        .args(["run", "--config", "./does-not-exist.yml"])
        .output()
        .context("run volley binary")?;
    ensure_code(&out, 30)
}

#[test]
fn unreachable_target_exit_40() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_volley"))
        .args([
            "run",
            "--url",
            "http://127.0.0.1:1/",
            "--requests",
            "1",
            "--concurrency",
            "1",
            "--silent",
        ])
        .output()
        .context("run volley binary")?;
    ensure_code(&out, 40)
}

#[tokio::test]
async fn failed_tests_exit_11() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let dir = tempfile::tempdir().context("tempdir")?;
    let config = dir.path().join("bench.json");
    std::fs::write(
        &config,
        format!(
            r#"{{
                "request": {{ "url": "{}" }},
                "runner": {{ "requests": 3, "concurrency": 1 }},
                "tests": [
                    {{ "name": "some failures", "field": "RequestFailureCount", "predicate": "GT", "target": 0 }}
                ]
            }}"#,
            server.urls().hello
        ),
    )
    .context("write config")?;

    let out = volley(vec![
        "run".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "--silent".to_string(),
    ])
    .await?;
    server.shutdown().await;

    ensure_code(&out, 11)?;
    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::ensure!(
        stderr.contains("want RequestFailureCount > 0, got 0"),
        "stderr:\n{stderr}"
    );
    Ok(())
}

#[tokio::test]
async fn passing_tests_exit_0() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;

    let dir = tempfile::tempdir().context("tempdir")?;
    let config = dir.path().join("bench.yml");
    std::fs::write(
        &config,
        format!(
            "request:\n  url: {}\nrunner:\n  requests: 4\n  concurrency: 2\ntests:\n  - name: all ok\n    field: StatusCodesDistribution.200\n    predicate: EQ\n    target: 4\n",
            server.urls().hello
        ),
    )
    .context("write config")?;

    let out = volley(vec![
        "run".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "--silent".to_string(),
    ])
    .await?;
    server.shutdown().await;

    ensure_code(&out, 0)?;
    let stdout = String::from_utf8_lossy(&out.stdout);
    anyhow::ensure!(stdout.contains("tests: 1/1 passed"), "stdout:\n{stdout}");
    Ok(())
}
