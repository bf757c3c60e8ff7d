use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Aggregate, FieldType, MetricValue, RequestFailure, ResponseTime, TimeStats};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field {0:?}")]
    Unknown(String),

    #[error("field {0:?} is not allowed")]
    NotAllowed(String),

    #[error("field {path:?} holds {ty} values, which cannot be compared")]
    NotComparable { path: String, ty: FieldType },
}

/// Walks a dotted path over a metrics value or its schema.
///
/// Struct fields and accessors match case-insensitively. Map and sequence lookups that miss
/// resolve to the element's zero value. A path that stops at a non-scalar, or continues past a
/// scalar, does not resolve.
pub trait Resolve {
    fn resolve(&self, path: &[&str]) -> Option<MetricValue>;

    fn resolve_type(path: &[&str]) -> Option<FieldType>
    where
        Self: Sized;
}

macro_rules! scalar {
    ($ty:ty, $field_type:expr, |$v:ident| $value:expr) => {
        impl Resolve for $ty {
            fn resolve(&self, path: &[&str]) -> Option<MetricValue> {
                let $v = self;
                path.is_empty().then(|| $value)
            }

            fn resolve_type(path: &[&str]) -> Option<FieldType> {
                path.is_empty().then_some($field_type)
            }
        }
    };
}

scalar!(Duration, FieldType::Duration, |v| MetricValue::Duration(*v));
scalar!(usize, FieldType::Int, |v| MetricValue::Int(
    i64::try_from(*v).unwrap_or(i64::MAX)
));
scalar!(String, FieldType::Text, |v| MetricValue::Text(v.clone()));

impl<T: Resolve + Default> Resolve for Vec<T> {
    fn resolve(&self, path: &[&str]) -> Option<MetricValue> {
        let (head, rest) = path.split_first()?;
        match head.parse::<usize>().ok().and_then(|i| self.get(i)) {
            Some(item) => item.resolve(rest),
            None => T::default().resolve(rest),
        }
    }

    fn resolve_type(path: &[&str]) -> Option<FieldType> {
        let (_, rest) = path.split_first()?;
        T::resolve_type(rest)
    }
}

impl<K: FromStr + Ord, V: Resolve + Default> Resolve for BTreeMap<K, V> {
    fn resolve(&self, path: &[&str]) -> Option<MetricValue> {
        let (head, rest) = path.split_first()?;
        let key = head.parse::<K>().ok()?;
        match self.get(&key) {
            Some(item) => item.resolve(rest),
            None => V::default().resolve(rest),
        }
    }

    fn resolve_type(path: &[&str]) -> Option<FieldType> {
        let (head, rest) = path.split_first()?;
        head.parse::<K>().ok()?;
        V::resolve_type(rest)
    }
}

/// Generates a struct visitor from a table of `Name => field` entries.
macro_rules! fields {
    ($ty:ty, |$s:ident| { $($name:literal => $field_ty:ty : $access:expr),+ $(,)? }) => {
        impl Resolve for $ty {
            fn resolve(&self, path: &[&str]) -> Option<MetricValue> {
                let $s = self;
                let (head, rest) = path.split_first()?;
                $(
                    if head.eq_ignore_ascii_case($name) {
                        return $access.resolve(rest);
                    }
                )+
                None
            }

            fn resolve_type(path: &[&str]) -> Option<FieldType> {
                let (head, rest) = path.split_first()?;
                $(
                    if head.eq_ignore_ascii_case($name) {
                        return <$field_ty>::resolve_type(rest);
                    }
                )+
                None
            }
        }
    };
}

fields!(TimeStats, |s| {
    "Min" => Duration: s.min,
    "Max" => Duration: s.max,
    "Mean" => Duration: s.mean,
    "Median" => Duration: s.median,
    "StdDev" => Duration: s.stddev,
    "Quartiles" => Vec<Duration>: s.quartiles,
    "Deciles" => Vec<Duration>: s.deciles,
});

fields!(ResponseTime, |s| {
    "ResponseTime" => Duration: s.response_time,
});

fields!(RequestFailure, |s| {
    "Reason" => String: s.reason,
});

fields!(Aggregate, |s| {
    "Records" => Vec<ResponseTime>: s.records,
    "RequestFailures" => Vec<RequestFailure>: s.request_failures,
    "ResponseTimes" => TimeStats: s.response_times,
    "RequestEventTimes" => BTreeMap<volley_http::EventName, TimeStats>: s.request_event_times,
    "StatusCodesDistribution" => BTreeMap<u16, usize>: s.status_codes_distribution,
    "RequestCount" => usize: s.request_count(),
    "RequestSuccessCount" => usize: s.request_success_count(),
    "RequestFailureCount" => usize: s.request_failure_count(),
});

/// Regex allow-list for field paths. An empty policy allows everything.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicy {
    allowed: Vec<Regex>,
}

impl FieldPolicy {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { allowed })
    }

    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|re| re.is_match(path))
    }
}

/// A dotted path addressing a scalar inside an [`Aggregate`], e.g. `ResponseTimes.Mean` or
/// `StatusCodesDistribution.404`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field(String);

impl Field {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> Option<Vec<&str>> {
        let segments: Vec<&str> = self.0.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(segments)
    }

    /// Schema-level type of the addressed scalar, without needing any data.
    #[must_use]
    pub fn field_type(&self) -> Option<FieldType> {
        Aggregate::resolve_type(&self.segments()?)
    }

    /// Checks that the path resolves under `policy` and returns its type.
    pub fn validate(&self, policy: &FieldPolicy) -> Result<FieldType, FieldError> {
        if !policy.allows(&self.0) {
            return Err(FieldError::NotAllowed(self.0.clone()));
        }
        self.field_type()
            .ok_or_else(|| FieldError::Unknown(self.0.clone()))
    }

    /// Reads the addressed value out of `aggregate`.
    #[must_use]
    pub fn get(&self, aggregate: &Aggregate) -> Option<MetricValue> {
        aggregate.resolve(&self.segments()?)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}
