use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::scope::Interrupt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Running,
    Done,
    Canceled,
    Timeout,
    /// Stopped for a reason that is neither cancellation nor timeout.
    Error,
}

/// Why a recording stopped before (or instead of) completing every iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Interrupted(Interrupt),
    Failed(String),
}

/// Point-in-time view of a recorder. Taken under the recorder lock, so `done` and `done_count`
/// always agree with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub done: bool,
    pub error: Option<StopReason>,
    pub done_count: usize,
    /// Target number of requests, `-1` when bounded only by `timeout`.
    pub max_count: i64,
    pub timeout: Duration,
    pub elapsed: Duration,
}

impl Progress {
    #[must_use]
    pub fn status(&self) -> Status {
        if !self.done {
            return Status::Running;
        }
        match &self.error {
            None => Status::Done,
            Some(StopReason::Interrupted(Interrupt::Canceled)) => Status::Canceled,
            Some(StopReason::Interrupted(Interrupt::DeadlineExceeded)) => Status::Timeout,
            Some(StopReason::Failed(_)) => Status::Error,
        }
    }

    /// Completion percentage in `0..=100`.
    #[must_use]
    pub fn percent(&self) -> u32 {
        let pct = if self.max_count < 0 {
            let timeout = self.timeout.as_nanos();
            if timeout == 0 {
                return 0;
            }
            self.elapsed.as_nanos().saturating_mul(100) / timeout
        } else {
            if self.max_count == 0 {
                return 0;
            }
            (self.done_count as u128).saturating_mul(100) / (self.max_count as u128)
        };
        pct.min(100) as u32
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} {}",
            self.status(),
            self.done_count,
            self.max_count,
            self.percent()
        )
    }
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync + 'static>;
