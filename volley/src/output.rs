use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, spec: &volley_core::RunSpec);
    fn progress(&self) -> Option<volley_core::ProgressFn>;
    fn print_report(&self, report: &volley_core::Report) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat, silent: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new(silent)),
        OutputFormat::Json => Box::new(json::JsonOutput { silent }),
    }
}
