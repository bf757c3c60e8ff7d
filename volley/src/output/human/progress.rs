use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use volley_core::{Progress, Status};

use super::duration::format_duration;

pub(crate) struct HumanProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    pub(crate) fn update(&self, p: &Progress) {
        let mut guard = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = guard.get_or_insert_with(|| {
            let pb = ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::stderr_with_hz(5));
            pb.set_style(bar_style());
            pb
        });

        pb.set_prefix(p.status().to_string());
        pb.set_position(u64::from(p.percent()));
        pb.set_message(message(p));

        if p.status() != Status::Running {
            pb.tick();
        }
    }

    pub(crate) fn finish(&self) {
        let mut guard = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

fn message(p: &Progress) -> String {
    if p.max_count < 0 {
        format!(
            "requests={} elapsed={}/{}",
            p.done_count,
            format_duration(p.elapsed),
            format_duration(p.timeout)
        )
    } else {
        format!(
            "requests={}/{} elapsed={}",
            p.done_count,
            p.max_count,
            format_duration(p.elapsed)
        )
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
