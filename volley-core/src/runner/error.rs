use super::Report;
use crate::dispatcher;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid run spec: {}", .0.join("; "))]
    InvalidSpec(Vec<String>),

    #[error("connection error: {0}")]
    Connection(String),

    /// The run was cancelled; the report covers the requests completed before that.
    #[error("run canceled")]
    Canceled(Box<Report>),

    #[error("invalid dispatcher setup: {0}")]
    Dispatcher(#[from] dispatcher::Error),
}
