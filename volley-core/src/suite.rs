mod eval;
mod predicate;

pub use eval::{CaseResult, SuiteResult, TestCase, evaluate};
pub use predicate::Predicate;
