mod error;
mod report;
mod run;
mod spec;

pub use error::{Error, Result};
pub use report::{Metadata, Report};
pub use run::Runner;
pub use spec::RunSpec;
