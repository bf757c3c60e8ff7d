use std::sync::Arc;

mod duration;
mod format;
mod progress;
mod summary;

use duration::format_duration;
use progress::HumanProgress;
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Option<Arc<HumanProgress>>,
}

impl HumanReadableOutput {
    pub(crate) fn new(silent: bool) -> Self {
        Self {
            progress: (!silent).then(|| Arc::new(HumanProgress::new())),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, spec: &volley_core::RunSpec) {
        println!("target: {} {}", spec.request.method, spec.request.url);
        let requests = if spec.requests < 0 {
            "until timeout".to_string()
        } else {
            spec.requests.to_string()
        };
        println!(
            "requests: {requests} concurrency={} interval={} request_timeout={} global_timeout={}",
            spec.concurrency,
            format_duration(spec.interval),
            format_duration(spec.request_timeout),
            format_duration(spec.global_timeout)
        );
        println!();
    }

    fn progress(&self) -> Option<volley_core::ProgressFn> {
        let progress = self.progress.clone()?;
        Some(Arc::new(move |p| progress.update(&p)))
    }

    fn print_report(&self, report: &volley_core::Report) -> anyhow::Result<()> {
        if let Some(progress) = &self.progress {
            progress.finish();
        }
        print!("{}", render(report));

        let failed: Vec<_> = report.tests.cases.iter().filter(|c| !c.pass).collect();
        if !failed.is_empty() {
            eprintln!("tests failed:");
            for case in failed {
                eprintln!("  {}: {}", case.input.name, case.summary);
            }
        }

        Ok(())
    }
}
