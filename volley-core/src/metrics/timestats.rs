use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::nanos;

const QUARTILES: usize = 4;
const DECILES: usize = 10;

/// Summary of a duration sample.
///
/// `quartiles` and `deciles` stay empty until the sample holds at least 4 and 10 values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeStats {
    #[serde(with = "nanos")]
    pub min: Duration,
    #[serde(with = "nanos")]
    pub max: Duration,
    #[serde(with = "nanos")]
    pub mean: Duration,
    #[serde(with = "nanos")]
    pub median: Duration,
    #[serde(rename = "StdDev", with = "nanos")]
    pub stddev: Duration,
    #[serde(with = "nanos::vec", default)]
    pub quartiles: Vec<Duration>,
    #[serde(with = "nanos::vec", default)]
    pub deciles: Vec<Duration>,
}

impl TimeStats {
    /// Computes stats over `sample`; an empty sample yields all zeros.
    #[must_use]
    pub fn compute(sample: &[Duration]) -> Self {
        if sample.is_empty() {
            return Self::default();
        }

        let mut sorted = sample.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();

        let raw: Vec<u128> = sorted.iter().map(Duration::as_nanos).collect();
        let sum: u128 = raw.iter().sum();
        let mean = sum / n as u128;

        let median = if n % 2 == 1 {
            raw[n / 2]
        } else {
            (raw[n / 2 - 1] + raw[n / 2]) / 2
        };

        let mean_f = sum as f64 / n as f64;
        let variance = raw
            .iter()
            .map(|&v| {
                let delta = v as f64 - mean_f;
                delta * delta
            })
            .sum::<f64>()
            / n as f64;

        Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean: from_nanos(mean),
            median: from_nanos(median),
            stddev: Duration::from_nanos(variance.sqrt().round() as u64),
            quartiles: rank_quantiles(&sorted, QUARTILES),
            deciles: rank_quantiles(&sorted, DECILES),
        }
    }
}

fn from_nanos(v: u128) -> Duration {
    Duration::from_nanos(u64::try_from(v).unwrap_or(u64::MAX))
}

/// Entry `i` (1-based) is the element at `i * (n + 1) / k`, clamped to the last index.
fn rank_quantiles(sorted: &[Duration], k: usize) -> Vec<Duration> {
    let n = sorted.len();
    if n < k {
        return Vec::new();
    }
    (1..=k)
        .map(|i| sorted[(i * (n + 1) / k).min(n - 1)])
        .collect()
}
