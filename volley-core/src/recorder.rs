mod progress;
mod record;

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use volley_http::{EventName, HttpClient, HttpRequest, Tracer};

use crate::dispatcher::{self, Dispatcher};
use crate::scope::{Interrupt, RunScope};

pub use progress::{Progress, ProgressFn, Status, StopReason};
pub use record::Record;

const PROGRESS_TICK: Duration = Duration::from_secs(1);

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    /// The caller cancelled the run. Carries every record collected before the cancellation.
    #[error("run canceled after {} records", .records.len())]
    Canceled { records: Vec<Record> },

    #[error(transparent)]
    Dispatcher(#[from] dispatcher::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Number of requests, or `-1` to keep going until `global_timeout`.
    pub requests: i64,
    pub concurrency: usize,
    pub interval: Duration,
    pub request_timeout: Duration,
    pub global_timeout: Duration,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<Record>,
    started: Option<Instant>,
    finished: Option<Instant>,
    error: Option<StopReason>,
}

struct Shared {
    client: HttpClient,
    state: RwLock<State>,
    on_progress: Option<ProgressFn>,
    max_count: i64,
    timeout: Duration,
}

impl Shared {
    fn snapshot(&self, state: &State) -> Progress {
        let elapsed = match (state.started, state.finished) {
            (Some(started), Some(finished)) => finished.duration_since(started),
            (Some(started), None) => started.elapsed(),
            _ => Duration::ZERO,
        };
        Progress {
            done: state.finished.is_some(),
            error: state.error.clone(),
            done_count: state.records.len(),
            max_count: self.max_count,
            timeout: self.timeout,
            elapsed,
        }
    }

    /// Appends `record` and pushes a snapshot while still holding the write lock.
    fn append(&self, record: Record) {
        let mut state = self.state.write();
        state.records.push(record);
        if let Some(on_progress) = &self.on_progress {
            on_progress(self.snapshot(&state));
        }
    }

    fn push_progress(&self) {
        if let Some(on_progress) = &self.on_progress {
            let state = self.state.read();
            on_progress(self.snapshot(&state));
        }
    }
}

/// Executes one request template many times and keeps a [`Record`] per attempt.
///
/// A recorder is meant for a single run. The progress callback runs while the recorder lock is
/// held, so it must not call back into [`Recorder::progress`].
pub struct Recorder {
    config: RecorderConfig,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    #[must_use]
    pub fn new(config: RecorderConfig, on_progress: Option<ProgressFn>) -> Self {
        let client = HttpClient::new(Some(config.request_timeout));
        let shared = Arc::new(Shared {
            client,
            state: RwLock::new(State::default()),
            on_progress,
            max_count: config.requests,
            timeout: config.global_timeout,
        });
        Self { config, shared }
    }

    #[must_use]
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        let state = self.shared.state.read();
        self.shared.snapshot(&state)
    }

    /// Runs the load described by the recorder config against `request`.
    ///
    /// Expiry of the global timeout ends the run normally. Cancelling `scope` yields
    /// [`Error::Canceled`] with the records collected so far.
    pub async fn record(&self, scope: &RunScope, request: HttpRequest) -> Result<Vec<Record>> {
        let request = request.with_timeout(self.config.request_timeout);
        self.ping(scope, &request).await?;

        {
            let mut state = self.shared.state.write();
            *state = State {
                started: Some(Instant::now()),
                ..State::default()
            };
        }
        // Stamped after `started` so an expired run never reports less than its full timeout.
        let run_scope = scope.with_timeout(self.config.global_timeout);
        tracing::debug!(
            url = %request.url,
            requests = self.config.requests,
            concurrency = self.config.concurrency,
            "recording started"
        );

        let ticker_scope = run_scope.child();
        let ticker = self.spawn_ticker(ticker_scope.clone());

        let dispatcher = Dispatcher::new(self.config.concurrency);
        let interval = self.config.interval;
        let shared = self.shared.clone();
        let iteration_scope = run_scope.clone();
        let outcome = dispatcher
            .run(&run_scope, self.config.requests, move || {
                iterate(
                    shared.clone(),
                    request.clone(),
                    iteration_scope.clone(),
                    interval,
                )
            })
            .await;

        ticker_scope.cancel();
        if let Some(ticker) = ticker {
            let _ = ticker.await;
        }

        let stop = match outcome {
            Ok(()) => None,
            Err(dispatcher::Error::Interrupted(cause)) => Some(StopReason::Interrupted(cause)),
            Err(err) => {
                self.finish(Some(StopReason::Failed(err.to_string())));
                return Err(err.into());
            }
        };
        // Every iteration may already have started when the caller cancels, in which case the
        // dispatcher finishes normally and only the in-flight requests observed it.
        let stop = match scope.interrupt() {
            Some(Interrupt::Canceled) => Some(StopReason::Interrupted(Interrupt::Canceled)),
            _ => stop,
        };
        let canceled = matches!(stop, Some(StopReason::Interrupted(Interrupt::Canceled)));
        let records = self.finish(stop);

        tracing::debug!(records = records.len(), canceled, "recording finished");
        if canceled {
            return Err(Error::Canceled { records });
        }
        Ok(records)
    }

    async fn ping(&self, scope: &RunScope, request: &HttpRequest) -> Result<()> {
        let mut probe = HttpRequest::get(&request.url);
        probe.timeout = request.timeout;
        let tracer = Tracer::start();

        let res = tokio::select! {
            biased;
            cause = scope.done() => {
                return match cause {
                    Interrupt::Canceled => Err(Error::Canceled { records: Vec::new() }),
                    Interrupt::DeadlineExceeded => Err(Error::Connection(cause.to_string())),
                };
            }
            res = self.shared.client.send(probe, &tracer) => res,
        };
        res.map(|_| ()).map_err(|err| {
            tracing::debug!(url = %request.url, error = %err, "preflight ping failed");
            Error::Connection(err.to_string())
        })
    }

    fn spawn_ticker(&self, stop: RunScope) -> Option<JoinHandle<()>> {
        self.shared.on_progress.as_ref()?;
        let shared = self.shared.clone();
        Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(PROGRESS_TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.done() => break,
                    _ = ticks.tick() => shared.push_progress(),
                }
            }
        }))
    }

    fn finish(&self, stop: Option<StopReason>) -> Vec<Record> {
        let mut state = self.shared.state.write();
        state.finished = Some(Instant::now());
        state.error = stop;
        if let Some(on_progress) = &self.shared.on_progress {
            on_progress(self.shared.snapshot(&state));
        }
        state.records.clone()
    }
}

async fn iterate(shared: Arc<Shared>, request: HttpRequest, scope: RunScope, interval: Duration) {
    let tracer = Tracer::start();
    let outcome = tokio::select! {
        biased;
        cause = scope.done() => Err(cause.to_string()),
        res = shared.client.send(request, &tracer) => res.map_err(|err| err.to_string()),
    };

    let record = match outcome {
        Ok(res) => {
            let events = tracer.events();
            let time = events
                .iter()
                .rev()
                .find(|e| e.name == EventName::BodyRead)
                .or(events.last())
                .map(|e| e.time)
                .unwrap_or_default();
            Record {
                time,
                code: res.status,
                bytes: res.body.len(),
                error: String::new(),
                events,
            }
        }
        Err(reason) => Record::failed(reason),
    };
    shared.append(record);

    if !interval.is_zero() {
        tokio::select! {
            _ = scope.done() => {}
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
