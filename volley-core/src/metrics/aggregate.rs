use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use volley_http::EventName;

use super::TimeStats;
use crate::nanos;
use crate::recorder::Record;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseTime {
    #[serde(with = "nanos")]
    pub response_time: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestFailure {
    pub reason: String,
}

/// Statistical summary of a finished recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Aggregate {
    pub records: Vec<ResponseTime>,
    pub request_failures: Vec<RequestFailure>,
    pub response_times: TimeStats,
    pub request_event_times: BTreeMap<EventName, TimeStats>,
    pub status_codes_distribution: BTreeMap<u16, usize>,
}

impl Aggregate {
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        let times: Vec<Duration> = records.iter().map(|r| r.time).collect();

        let mut event_gaps: BTreeMap<EventName, Vec<Duration>> = BTreeMap::new();
        let mut status_codes: BTreeMap<u16, usize> = BTreeMap::new();
        for record in records {
            let mut prev = Duration::ZERO;
            for event in &record.events {
                event_gaps
                    .entry(event.name)
                    .or_default()
                    .push(event.time.saturating_sub(prev));
                prev = event.time;
            }
            *status_codes.entry(record.code).or_default() += 1;
        }

        Self {
            records: times
                .iter()
                .map(|&response_time| ResponseTime { response_time })
                .collect(),
            request_failures: records
                .iter()
                .filter(|r| r.is_failure())
                .map(|r| RequestFailure {
                    reason: r.error.clone(),
                })
                .collect(),
            response_times: TimeStats::compute(&times),
            request_event_times: event_gaps
                .into_iter()
                .map(|(name, gaps)| (name, TimeStats::compute(&gaps)))
                .collect(),
            status_codes_distribution: status_codes,
        }
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn request_success_count(&self) -> usize {
        self.request_count()
            .saturating_sub(self.request_failure_count())
    }

    #[must_use]
    pub fn request_failure_count(&self) -> usize {
        self.request_failures.len()
    }
}

impl Serialize for Aggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Wire<'a> {
            records: &'a [ResponseTime],
            request_failures: &'a [RequestFailure],
            response_times: &'a TimeStats,
            request_event_times: &'a BTreeMap<EventName, TimeStats>,
            status_codes_distribution: &'a BTreeMap<u16, usize>,
            request_count: usize,
            request_success_count: usize,
            request_failure_count: usize,
        }

        Wire {
            records: &self.records,
            request_failures: &self.request_failures,
            response_times: &self.response_times,
            request_event_times: &self.request_event_times,
            status_codes_distribution: &self.status_codes_distribution,
            request_count: self.request_count(),
            request_success_count: self.request_success_count(),
            request_failure_count: self.request_failure_count(),
        }
        .serialize(serializer)
    }
}
