use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;

use super::error::{Error, Result};
use super::{Metadata, Report, RunSpec};
use crate::metrics::{Aggregate, FieldPolicy};
use crate::recorder::{self, Progress, ProgressFn, Record, Recorder, RecorderConfig};
use crate::scope::RunScope;
use crate::suite;

/// Runs a [`RunSpec`] end to end: validation, recording, aggregation and test evaluation.
#[derive(Default)]
pub struct Runner {
    policy: FieldPolicy,
    on_progress: Option<ProgressFn>,
    current: Mutex<Option<Arc<Recorder>>>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("policy", &self.policy)
            .field("running", &self.current.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl Runner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FieldPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Installs a callback receiving live progress snapshots while a run is active.
    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Live snapshot of the active run, `None` when idle.
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        let recorder = self.current.lock().clone()?;
        Some(recorder.progress())
    }

    pub async fn run(&self, scope: &RunScope, spec: RunSpec) -> Result<Report> {
        spec.validate(&self.policy)?;

        let recorder = Arc::new(Recorder::new(
            RecorderConfig {
                requests: spec.requests,
                concurrency: spec.concurrency,
                interval: spec.interval,
                request_timeout: spec.request_timeout,
                global_timeout: spec.global_timeout,
            },
            self.on_progress.clone(),
        ));
        let _active = ActiveRun::install(&self.current, recorder.clone());

        tracing::info!(
            method = %spec.request.method,
            url = %spec.request.url,
            requests = spec.requests,
            concurrency = spec.concurrency,
            "run started"
        );
        let started = Instant::now();
        let outcome = recorder.record(scope, spec.request.clone()).await;
        let total_duration = started.elapsed();

        match outcome {
            Ok(records) => {
                let report = build_report(spec, &records, total_duration);
                tracing::info!(
                    requests = report.metrics.request_count(),
                    failures = report.metrics.request_failure_count(),
                    tests_pass = report.tests.pass,
                    elapsed = ?total_duration,
                    "run finished"
                );
                Ok(report)
            }
            Err(recorder::Error::Canceled { records }) => {
                tracing::info!(requests = records.len(), "run canceled");
                Err(Error::Canceled(Box::new(build_report(
                    spec,
                    &records,
                    total_duration,
                ))))
            }
            Err(recorder::Error::Connection(msg)) => {
                tracing::warn!(url = %spec.request.url, error = %msg, "target unreachable");
                Err(Error::Connection(msg))
            }
            Err(recorder::Error::Dispatcher(err)) => Err(Error::Dispatcher(err)),
        }
    }
}

fn build_report(spec: RunSpec, records: &[Record], total_duration: Duration) -> Report {
    let metrics = Aggregate::from_records(records);
    let tests = suite::evaluate(&metrics, &spec.tests);
    Report {
        metadata: Metadata {
            spec,
            finished_at: SystemTime::now(),
            total_duration,
        },
        metrics,
        tests,
    }
}

/// Publishes the active recorder for [`Runner::progress`] and withdraws it on drop, including
/// when the run future is dropped mid-flight.
struct ActiveRun<'a> {
    slot: &'a Mutex<Option<Arc<Recorder>>>,
}

impl<'a> ActiveRun<'a> {
    fn install(slot: &'a Mutex<Option<Arc<Recorder>>>, recorder: Arc<Recorder>) -> Self {
        *slot.lock() = Some(recorder);
        Self { slot }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}
