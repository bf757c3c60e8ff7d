use std::time::Duration;

use serde::Serialize;
use volley_http::HttpRequest;

use super::error::{Error, Result};
use crate::dispatcher::UNBOUNDED;
use crate::metrics::{FieldError, FieldPolicy};
use crate::nanos;
use crate::suite::TestCase;

/// Everything needed to perform one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    pub request: HttpRequest,
    /// Number of requests, or `-1` for "until `global_timeout`".
    pub requests: i64,
    pub concurrency: usize,
    #[serde(with = "nanos")]
    pub interval: Duration,
    #[serde(with = "nanos")]
    pub request_timeout: Duration,
    #[serde(with = "nanos")]
    pub global_timeout: Duration,
    pub tests: Vec<TestCase>,
}

impl RunSpec {
    /// Checks the whole spec and reports every problem at once.
    pub fn validate(&self, policy: &FieldPolicy) -> Result<()> {
        let mut issues = Vec::new();

        match url::Url::parse(&self.request.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => issues.push(format!(
                "request.url: unsupported scheme {:?} (expected http or https)",
                parsed.scheme()
            )),
            Err(err) => issues.push(format!("request.url: {err} ({:?})", self.request.url)),
        }

        if self.requests != UNBOUNDED && self.requests < 1 {
            issues.push(format!(
                "requests: must be -1 or a positive integer (got {})",
                self.requests
            ));
        }
        if self.concurrency < 1 {
            issues.push("concurrency: must be at least 1".to_string());
        } else if self.requests >= 1 && self.concurrency as u64 > self.requests as u64 {
            issues.push(format!(
                "concurrency: must not exceed requests ({} > {})",
                self.concurrency, self.requests
            ));
        }
        if self.request_timeout.is_zero() {
            issues.push("requestTimeout: must be greater than zero".to_string());
        }
        if self.global_timeout.is_zero() {
            issues.push("globalTimeout: must be greater than zero".to_string());
        }

        for (i, case) in self.tests.iter().enumerate() {
            if let Err(issue) = check_case(case, policy) {
                issues.push(format!("tests[{i}] ({}): {issue}", case.name));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidSpec(issues))
        }
    }
}

fn check_case(case: &TestCase, policy: &FieldPolicy) -> std::result::Result<(), String> {
    let ty = case.field.validate(policy).map_err(|e| e.to_string())?;
    if !ty.is_comparable() {
        return Err(FieldError::NotComparable {
            path: case.field.path().to_string(),
            ty,
        }
        .to_string());
    }
    let target = case.target.field_type();
    if target != ty {
        return Err(format!(
            "target is a {target} but {} is a {ty}",
            case.field
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Field, MetricValue};
    use crate::suite::Predicate;

    fn spec() -> RunSpec {
        RunSpec {
            request: HttpRequest::get("http://localhost:8080/"),
            requests: 10,
            concurrency: 2,
            interval: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
            global_timeout: Duration::from_secs(5),
            tests: Vec::new(),
        }
    }

    fn issues(spec: &RunSpec) -> Vec<String> {
        match spec.validate(&FieldPolicy::default()) {
            Ok(()) => Vec::new(),
            Err(Error::InvalidSpec(issues)) => issues,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_spec_passes() {
        assert!(issues(&spec()).is_empty());

        let unbounded = RunSpec {
            requests: -1,
            concurrency: 50,
            ..spec()
        };
        assert!(issues(&unbounded).is_empty());
    }

    #[test]
    fn collects_every_issue() {
        let bad = RunSpec {
            request: HttpRequest::get("ftp://example.com"),
            requests: 0,
            concurrency: 0,
            request_timeout: Duration::ZERO,
            global_timeout: Duration::ZERO,
            ..spec()
        };
        let found = issues(&bad);
        assert_eq!(found.len(), 5, "{found:?}");
        assert!(found[0].contains("unsupported scheme"));
    }

    #[test]
    fn concurrency_cannot_exceed_requests() {
        let bad = RunSpec {
            requests: 2,
            concurrency: 3,
            ..spec()
        };
        assert_eq!(issues(&bad).len(), 1);
    }

    #[test]
    fn test_cases_are_type_checked() {
        let bad = RunSpec {
            tests: vec![
                TestCase {
                    name: "mismatch".to_string(),
                    field: Field::new("ResponseTimes.Mean"),
                    predicate: Predicate::Lt,
                    target: MetricValue::Int(5),
                },
                TestCase {
                    name: "unknown".to_string(),
                    field: Field::new("ResponseTimes.P99"),
                    predicate: Predicate::Lt,
                    target: MetricValue::Int(5),
                },
                TestCase {
                    name: "text".to_string(),
                    field: Field::new("RequestFailures.0.Reason"),
                    predicate: Predicate::Eq,
                    target: MetricValue::Text("x".to_string()),
                },
                TestCase {
                    name: "ok".to_string(),
                    field: Field::new("RequestFailureCount"),
                    predicate: Predicate::Eq,
                    target: MetricValue::Int(0),
                },
            ],
            ..spec()
        };
        let found = issues(&bad);
        assert_eq!(found.len(), 3, "{found:?}");
        assert!(found[0].starts_with("tests[0] (mismatch)"));
        assert!(found[1].contains("unknown field"));
        assert!(found[2].contains("cannot be compared"));
    }

    #[test]
    fn invalid_spec_message_joins_issues() {
        let err = Error::InvalidSpec(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "invalid run spec: a; b");
    }
}
