use std::fmt::Display;
use std::time::Duration;

use volley_http::Event;

/// Outcome of a single attempted request. Immutable once appended to a recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// From request start to the end of the body read.
    pub time: Duration,
    /// HTTP status, `0` when no response was received.
    pub code: u16,
    /// Response body length.
    pub bytes: usize,
    /// Empty on success.
    pub error: String,
    /// Lifecycle events with offsets cumulative from request start.
    pub events: Vec<Event>,
}

impl Record {
    pub(crate) fn failed(reason: impl Display) -> Self {
        Self {
            error: format!("recording error: {reason}"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.error.is_empty()
    }
}
