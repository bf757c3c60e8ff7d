pub mod config;
pub mod dispatcher;
pub mod metrics;
mod nanos;
pub mod recorder;
pub mod runner;
pub mod scope;
pub mod suite;

pub use config::ConfigFile;
pub use dispatcher::Dispatcher;
pub use metrics::{Aggregate, Field, FieldPolicy, FieldType, MetricValue, TimeStats};
pub use recorder::{Progress, ProgressFn, Record, Recorder, RecorderConfig, Status};
pub use runner::{Report, RunSpec, Runner};
pub use scope::{Interrupt, RunScope};
pub use suite::{CaseResult, Predicate, SuiteResult, TestCase};
