use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single traced request. Surfaced to callers as the record's error text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("unsupported scheme in {0:?} (expected http or https)")]
    UnsupportedScheme(String),

    #[error("building request: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("{0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("request timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("reading response body: {0}")]
    BodyRead(#[from] hyper::Error),
}
