use serde::Serialize;

use super::Predicate;
use crate::metrics::{Aggregate, Field, MetricValue};

/// A single assertion against a metric of the finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub name: String,
    pub field: Field,
    pub predicate: Predicate,
    pub target: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub input: TestCase,
    pub pass: bool,
    pub got: MetricValue,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    pub pass: bool,
    pub cases: Vec<CaseResult>,
}

impl TestCase {
    /// Evaluates the case against `aggregate`.
    ///
    /// # Panics
    ///
    /// Panics when the target type does not match the field type. Cases are checked for this
    /// when the run is validated.
    #[must_use]
    pub fn evaluate(&self, aggregate: &Aggregate) -> CaseResult {
        let got = self
            .field
            .get(aggregate)
            .unwrap_or_else(|| MetricValue::zero(self.target.field_type()));
        let pass = self.predicate.matches(&got, &self.target);
        let summary = format!(
            "want {} {} {}, got {}",
            self.field,
            self.predicate.symbol(),
            self.target,
            got
        );
        CaseResult {
            input: self.clone(),
            pass,
            got,
            summary,
        }
    }
}

/// Runs every case in order. An empty suite passes.
#[must_use]
pub fn evaluate(aggregate: &Aggregate, cases: &[TestCase]) -> SuiteResult {
    let cases: Vec<CaseResult> = cases.iter().map(|c| c.evaluate(aggregate)).collect();
    SuiteResult {
        pass: cases.iter().all(|c| c.pass),
        cases,
    }
}
