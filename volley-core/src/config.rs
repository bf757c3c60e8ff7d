mod duration;
mod error;
mod file;

pub use duration::ConfigDuration;
pub use error::{Error, Result};
pub use file::{
    BodyConfig, BodyType, ConfigFile, DEFAULT_CONCURRENCY, DEFAULT_GLOBAL_TIMEOUT, DEFAULT_METHOD,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_REQUESTS, RequestConfig, RunnerConfig, TargetConfig,
    TestConfig,
};
