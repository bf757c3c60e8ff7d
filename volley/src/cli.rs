use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use volley_core::config::{BodyConfig, BodyType};

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(s)
        .map_err(|err| format!("invalid duration '{s}': {err} (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_header(input: &str) -> Result<(String, String), String> {
    let Some((name, value)) = input.split_once(':') else {
        return Err(format!("invalid header '{input}' (expected NAME:VALUE)"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid header '{input}' (empty name)"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_body(input: &str) -> Result<BodyConfig, String> {
    let Some((kind, content)) = input.split_once(':') else {
        return Err(format!("invalid body '{input}' (expected TYPE:CONTENT, e.g. raw:hello)"));
    };
    let kind = match kind {
        "raw" => BodyType::Raw,
        other => return Err(format!("unsupported body type '{other}' (supported: raw)")),
    };
    Ok(BodyConfig {
        kind,
        content: content.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    #[value(alias = "human")]
    HumanReadable,
    /// Emit JSON progress lines and the final report (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "volley",
    author,
    version,
    about = "Programmable HTTP load generator",
    long_about = "volley fires a fixed (or time-bounded) number of HTTP requests at a target with bounded concurrency, records per-request transport timings, aggregates them and evaluates user-defined tests against the result.\n\nA run is described by a JSON or YAML config file and/or CLI flags; flags override file values.",
    after_help = "Examples:\n  volley run --url http://localhost:8080/ --requests 1000 --concurrency 50\n  volley run --config bench.yml --global-timeout 1m --output json\n  volley run --url http://localhost:8080/echo --method POST --body raw:ping --header Content-Type:text/plain\n  volley serve --bind 127.0.0.1:9000 --token secret"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a benchmark against an HTTP target
    #[command(
        long_about = "Run a benchmark described by a config file and/or flags.\n\nCLI flags override values from the config file. Pass `--requests -1` to keep sending until the global timeout."
    )]
    Run(RunArgs),

    /// Serve the websocket control plane
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// JSON or YAML config file (.json, .yml, .yaml)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// HTTP method (default GET)
    #[arg(short, long)]
    pub method: Option<String>,

    /// Target URL (http or https)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Request header (repeatable, NAME:VALUE)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body as TYPE:CONTENT (only `raw` is supported)
    #[arg(short, long, value_name = "TYPE:CONTENT", value_parser = parse_body)]
    pub body: Option<BodyConfig>,

    /// Number of requests, or -1 to run until the global timeout
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub requests: Option<i64>,

    /// Number of concurrent workers
    #[arg(short = 'C', long)]
    pub concurrency: Option<usize>,

    /// Pause each worker between two requests (e.g. 50ms)
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Per-request timeout (e.g. 5s)
    #[arg(long, value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Timeout for the whole run (e.g. 30s, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub global_timeout: Option<Duration>,

    /// Do not render live progress
    #[arg(short, long)]
    pub silent: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on (use port 0 to pick a free one)
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Access token clients must present; connections are unauthenticated when unset
    #[arg(long, env = "VOLLEY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Regex restricting which metric fields tests may reference (repeatable)
    #[arg(long = "allow-field", value_name = "REGEX")]
    pub allowed_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("1m 30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
    }

    #[test]
    fn parse_header_and_body() {
        assert_eq!(
            parse_header("Content-Type: text/plain"),
            Ok(("Content-Type".to_string(), "text/plain".to_string()))
        );
        assert_eq!(
            parse_header("X-Url:http://a/b"),
            Ok(("X-Url".to_string(), "http://a/b".to_string()))
        );
        assert!(parse_header("novalue").is_err());
        assert!(parse_header(":v").is_err());

        assert_eq!(
            parse_body("raw:a:b"),
            Ok(BodyConfig {
                kind: BodyType::Raw,
                content: "a:b".to_string()
            })
        );
        assert!(parse_body("json:{}").is_err());
        assert!(parse_body("raw").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let parsed = Cli::try_parse_from([
            "volley",
            "run",
            "--url",
            "http://localhost:8080/echo",
            "--method",
            "post",
            "-H",
            "A:1",
            "--header",
            "B:2",
            "--body",
            "raw:ping",
            "--requests",
            "-1",
            "--concurrency",
            "4",
            "--interval",
            "50ms",
            "--global-timeout",
            "2s",
            "--silent",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.config, None);
                assert_eq!(args.url.as_deref(), Some("http://localhost:8080/echo"));
                assert_eq!(args.method.as_deref(), Some("post"));
                assert_eq!(
                    args.headers,
                    vec![
                        ("A".to_string(), "1".to_string()),
                        ("B".to_string(), "2".to_string())
                    ]
                );
                assert_eq!(args.body.map(|b| b.content), Some("ping".to_string()));
                assert_eq!(args.requests, Some(-1));
                assert_eq!(args.concurrency, Some(4));
                assert_eq!(args.interval, Some(Duration::from_millis(50)));
                assert_eq!(args.request_timeout, None);
                assert_eq!(args.global_timeout, Some(Duration::from_secs(2)));
                assert!(args.silent);
                assert_eq!(args.output, OutputFormat::Json);
            }
            Command::Serve(_) => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_accepts_human_alias() {
        let parsed = Cli::try_parse_from(["volley", "run", "--output", "human"]);
        match parsed.map(|c| c.command) {
            Ok(Command::Run(args)) => assert_eq!(args.output, OutputFormat::HumanReadable),
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_serve_defaults() {
        let parsed = Cli::try_parse_from(["volley", "serve"]);
        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.bind, SocketAddr::from(([127, 0, 0, 1], 8080)));
                assert!(args.allowed_fields.is_empty());
            }
            Command::Run(_) => panic!("expected serve command"),
        }
    }
}
