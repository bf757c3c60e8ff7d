use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::nanos;

/// Type of a scalar addressed by a field path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    Int,
    Duration,
    Text,
}

impl FieldType {
    #[must_use]
    pub fn is_comparable(self) -> bool {
        matches!(self, Self::Int | Self::Duration)
    }
}

/// A scalar read out of an [`Aggregate`](super::Aggregate) or supplied as a test target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Int(i64),
    Duration(Duration),
    Text(String),
}

impl MetricValue {
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int(_) => FieldType::Int,
            Self::Duration(_) => FieldType::Duration,
            Self::Text(_) => FieldType::Text,
        }
    }

    #[must_use]
    pub fn zero(ty: FieldType) -> Self {
        match ty {
            FieldType::Int => Self::Int(0),
            FieldType::Duration => Self::Duration(Duration::ZERO),
            FieldType::Text => Self::Text(String::new()),
        }
    }

    /// Parses `raw` as a value of type `ty`. Durations use humantime notation (`50ms`, `2s`).
    pub fn parse(ty: FieldType, raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        match ty {
            FieldType::Int => raw
                .parse()
                .map(Self::Int)
                .map_err(|_| format!("expected an integer, got {raw:?}")),
            FieldType::Duration => humantime::parse_duration(raw)
                .map(Self::Duration)
                .map_err(|e| format!("expected a duration, got {raw:?}: {e}")),
            FieldType::Text => Ok(Self::Text(raw.to_string())),
        }
    }

    /// Numeric comparison of `self` against `other`.
    ///
    /// # Panics
    ///
    /// Panics when the operands have different types or are not numeric.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Duration(a), Self::Duration(b)) => a.cmp(b),
            (a, b) => panic!(
                "cannot compare {} metric with {} metric",
                a.field_type(),
                b.field_type()
            ),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Duration(d) => nanos::serialize(d, serializer),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}
