use std::time::{Duration, SystemTime};

use serde::{Serialize, Serializer};

use super::RunSpec;
use crate::metrics::Aggregate;
use crate::nanos;
use crate::suite::SuiteResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub spec: RunSpec,
    #[serde(serialize_with = "rfc3339")]
    pub finished_at: SystemTime,
    #[serde(with = "nanos")]
    pub total_duration: Duration,
}

/// Final outcome of a run, handed read-only to outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub metadata: Metadata,
    pub metrics: Aggregate,
    pub tests: SuiteResult,
}

fn rfc3339<S: Serializer>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_rfc3339_millis(*t))
}
