use std::collections::BTreeMap;

use volley_core::config::{ConfigDuration, RequestConfig, RunnerConfig};
use volley_core::{ConfigFile, RunScope, Runner, runner};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let spec = file.overlay(flag_overrides(&args)).into_run_spec()?;

    let out = output::formatter(args.output, args.silent);
    out.print_header(&spec);

    let mut runner = Runner::new();
    if let Some(progress) = out.progress() {
        runner = runner.with_progress(progress);
    }

    let scope = RunScope::new();
    let interrupt = tokio::spawn({
        let scope = scope.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, canceling run");
                scope.cancel();
            }
        }
    });

    let outcome = runner.run(&scope, spec).await;
    interrupt.abort();

    match outcome {
        Ok(report) => {
            out.print_report(&report).map_err(RunError::RuntimeError)?;
            Ok(ExitCode::from_tests(report.tests.pass))
        }
        Err(runner::Error::Canceled(report)) => {
            out.print_report(&report).map_err(RunError::RuntimeError)?;
            eprintln!("run canceled");
            Ok(ExitCode::Canceled)
        }
        Err(err @ runner::Error::Connection(_)) => Err(RunError::RuntimeError(
            anyhow::Error::new(err).context("preflight request failed"),
        )),
        Err(err) => Err(err.into()),
    }
}

/// Config layer built from CLI flags; applied on top of the config file.
fn flag_overrides(args: &RunArgs) -> ConfigFile {
    let mut header: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &args.headers {
        header.entry(name.clone()).or_default().push(value.clone());
    }

    ConfigFile {
        extends: None,
        request: RequestConfig {
            method: args.method.clone(),
            url: args.url.clone(),
            query_params: BTreeMap::new(),
            header,
            body: args.body.clone(),
        },
        runner: RunnerConfig {
            requests: args.requests,
            concurrency: args.concurrency,
            interval: args.interval.map(ConfigDuration::from),
            request_timeout: args.request_timeout.map(ConfigDuration::from),
            global_timeout: args.global_timeout.map(ConfigDuration::from),
        },
        tests: None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser as _;

    use super::*;
    use crate::cli::{Cli, Command};

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["volley", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).map(|c| c.command) {
            Ok(Command::Run(args)) => args,
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn flags_override_config_file() {
        let file = ConfigFile::from_yaml(
            "request:\n  url: http://localhost:1/a\n  header:\n    A: [file]\n    B: [file]\nrunner:\n  requests: 50\n  concurrency: 5\n  globalTimeout: 1m\n",
        )
        .unwrap_or_else(|e| panic!("{e}"));

        let args = run_args(&[
            "--url",
            "http://localhost:1/b",
            "-H",
            "B:flag",
            "-H",
            "B:again",
            "--requests",
            "10",
            "--request-timeout",
            "250ms",
        ]);

        let spec = file
            .overlay(flag_overrides(&args))
            .into_run_spec()
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(spec.request.url, "http://localhost:1/b");
        assert_eq!(
            spec.request.headers,
            vec![
                ("A".to_string(), "file".to_string()),
                ("B".to_string(), "flag".to_string()),
                ("B".to_string(), "again".to_string()),
            ]
        );
        assert_eq!(spec.requests, 10);
        assert_eq!(spec.concurrency, 5);
        assert_eq!(spec.request_timeout, Duration::from_millis(250));
        assert_eq!(spec.global_timeout, Duration::from_secs(60));
    }

    #[test]
    fn flags_alone_build_a_spec() {
        let args = run_args(&[
            "--url",
            "http://localhost:1/echo",
            "--method",
            "post",
            "--body",
            "raw:ping",
            "--requests",
            "-1",
            "--concurrency",
            "3",
        ]);

        let spec = ConfigFile::default()
            .overlay(flag_overrides(&args))
            .into_run_spec()
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(spec.request.method.as_str(), "POST");
        assert_eq!(&spec.request.body[..], b"ping");
        assert_eq!(spec.requests, -1);
        assert_eq!(spec.concurrency, 3);
    }

    #[test]
    fn missing_url_is_invalid_input() {
        let args = run_args(&["--requests", "5"]);
        let err = match ConfigFile::default().overlay(flag_overrides(&args)).into_run_spec() {
            Ok(spec) => panic!("expected invalid config, got {spec:?}"),
            Err(err) => RunError::from(err),
        };
        assert_eq!(err.exit_code(), ExitCode::InvalidInput);
        assert!(err.to_string().contains("request.url: missing"), "{err}");
    }
}
