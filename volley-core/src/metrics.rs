mod aggregate;
mod field;
mod timestats;
mod value;

pub use aggregate::{Aggregate, RequestFailure, ResponseTime};
pub use field::{Field, FieldError, FieldPolicy, Resolve};
pub use timestats::TimeStats;
pub use value::{FieldType, MetricValue};
