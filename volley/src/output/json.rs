use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use super::OutputFormatter;

pub(crate) struct JsonOutput {
    pub silent: bool,
}

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _spec: &volley_core::RunSpec) {}

    fn progress(&self) -> Option<volley_core::ProgressFn> {
        if self.silent {
            return None;
        }
        Some(Arc::new(move |p| {
            let line = JsonProgressLine::from_progress(&p);
            emit_json_line(&line);
        }))
    }

    fn print_report(&self, report: &volley_core::Report) -> anyhow::Result<()> {
        emit_json_line(&JsonReportLine {
            kind: "report",
            report,
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub status: String,
    pub done_count: usize,
    pub max_count: i64,
    pub percent: u32,
    pub elapsed_ms: u64,
}

impl JsonProgressLine {
    fn from_progress(p: &volley_core::Progress) -> Self {
        Self {
            kind: "progress",
            status: p.status().to_string(),
            done_count: p.done_count,
            max_count: p.max_count,
            percent: p.percent(),
            elapsed_ms: u64::try_from(p.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonReportLine<'a> {
    pub kind: &'static str,
    pub report: &'a volley_core::Report,
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;
    use volley_core::Progress;

    #[test]
    fn progress_line_has_kind_and_status() {
        let line = JsonProgressLine::from_progress(&Progress {
            done: true,
            error: None,
            done_count: 5,
            max_count: 10,
            timeout: Duration::from_secs(1),
            elapsed: Duration::from_millis(1500),
        });

        let v: Value = match serde_json::to_value(&line) {
            Ok(v) => v,
            Err(err) => panic!("to_value failed: {err}"),
        };
        assert_eq!(v.get("kind").and_then(Value::as_str), Some("progress"));
        assert_eq!(v.get("status").and_then(Value::as_str), Some("DONE"));
        assert_eq!(v.get("doneCount").and_then(Value::as_u64), Some(5));
        assert_eq!(v.get("maxCount").and_then(Value::as_i64), Some(10));
        assert_eq!(v.get("percent").and_then(Value::as_u64), Some(50));
        assert_eq!(v.get("elapsedMs").and_then(Value::as_u64), Some(1500));
    }
}
