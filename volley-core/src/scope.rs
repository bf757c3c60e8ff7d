use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`RunScope`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupt {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// A cancellable scope with an optional deadline.
///
/// Scopes form a tree: cancelling a scope cancels every scope derived from it, and a derived
/// scope never outlives its parent's deadline.
#[derive(Debug, Clone, Default)]
pub struct RunScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child scope that additionally expires after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    /// Derives a child scope that can be cancelled without affecting `self`.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check; cancellation wins over an expired deadline.
    #[must_use]
    pub fn interrupt(&self) -> Option<Interrupt> {
        if self.token.is_cancelled() {
            return Some(Interrupt::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) -> Interrupt {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Interrupt::Canceled,
                    _ = tokio::time::sleep_until(deadline) => Interrupt::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Interrupt::Canceled
            }
        }
    }
}
