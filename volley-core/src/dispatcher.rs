use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::scope::{Interrupt, RunScope};

/// Iteration count meaning "keep going until the scope ends".
pub const UNBOUNDED: i64 = -1;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid iteration count {0} (expected -1 or a positive integer)")]
    InvalidMaxIter(i64),

    #[error("iteration count {max_iter} is lower than the number of workers {workers}")]
    FewerIterationsThanWorkers { max_iter: i64, workers: usize },

    #[error(transparent)]
    Interrupted(#[from] Interrupt),
}

/// Runs a side-effectful action under a fixed concurrency cap.
///
/// Every iteration holds one semaphore permit for as long as its action runs, so at most
/// `workers` actions are in flight at any time. The scheduling loop itself only ever waits on
/// permit acquisition, which is also where it notices that the scope ended.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    workers: usize,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    /// # Panics
    ///
    /// Panics when `workers` is zero.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        if workers < 1 {
            panic!("dispatcher requires at least one worker (got {workers})");
        }
        Self {
            workers,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Invokes `action` `max_iter` times, or until `scope` ends when `max_iter` is [`UNBOUNDED`].
    ///
    /// Returns [`Error::Interrupted`] when the scope ended while waiting for a permit. Actions
    /// already started are always awaited before returning.
    pub async fn run<F, Fut>(&self, scope: &RunScope, max_iter: i64, action: F) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.validate(max_iter)?;

        let mut in_flight = JoinSet::new();
        let mut outcome = Ok(());
        let mut started: i64 = 0;

        while max_iter == UNBOUNDED || started < max_iter {
            let permit = tokio::select! {
                biased;
                cause = scope.done() => {
                    tracing::debug!(started, %cause, "dispatcher stopped early");
                    outcome = Err(Error::Interrupted(cause));
                    break;
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            started = started.saturating_add(1);
            let fut = action();
            in_flight.spawn(async move {
                fut.await;
                drop(permit);
            });

            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        outcome
    }

    fn validate(&self, max_iter: i64) -> Result<()> {
        if max_iter == UNBOUNDED {
            return Ok(());
        }
        if max_iter < 1 {
            return Err(Error::InvalidMaxIter(max_iter));
        }
        if (max_iter as u64) < self.workers as u64 {
            return Err(Error::FewerIterationsThanWorkers {
                max_iter,
                workers: self.workers,
            });
        }
        Ok(())
    }
}
