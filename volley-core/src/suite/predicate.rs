use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::metrics::MetricValue;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Predicate {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Predicate {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// Whether `ord` (observed compared to target) satisfies the predicate.
    #[must_use]
    pub fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Neq => ord != Ordering::Equal,
            Self::Gt => ord == Ordering::Greater,
            Self::Gte => ord != Ordering::Less,
            Self::Lt => ord == Ordering::Less,
            Self::Lte => ord != Ordering::Greater,
        }
    }

    /// # Panics
    ///
    /// Panics when `observed` and `target` are not numeric values of the same type.
    #[must_use]
    pub fn matches(self, observed: &MetricValue, target: &MetricValue) -> bool {
        self.accepts(observed.compare(target))
    }
}
