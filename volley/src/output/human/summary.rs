use std::collections::BTreeMap;
use std::fmt::Write as _;

use volley_core::metrics::TimeStats;

use super::duration::format_duration;
use super::format::{format_percent, format_rate, per_second};

pub(crate) fn render(report: &volley_core::Report) -> String {
    let mut out = String::new();
    let spec = &report.metadata.spec;
    let metrics = &report.metrics;

    out.push_str("summary\n");
    writeln!(
        &mut out,
        "  target: {} {}",
        spec.request.method, spec.request.url
    )
    .ok();
    writeln!(
        &mut out,
        "  requests: {} (succeeded {}, failed {})",
        metrics.request_count(),
        metrics.request_success_count(),
        metrics.request_failure_count()
    )
    .ok();
    writeln!(
        &mut out,
        "  duration: {} rps={}",
        format_duration(report.metadata.total_duration),
        format_rate(per_second(
            metrics.request_count(),
            report.metadata.total_duration
        ))
    )
    .ok();

    if metrics.request_count() == 0 {
        out.push_str("  response times: n/a\n");
    } else {
        writeln!(
            &mut out,
            "  response times: {}",
            format_stats(&metrics.response_times)
        )
        .ok();
        if !metrics.response_times.quartiles.is_empty() {
            writeln!(
                &mut out,
                "    quartiles: {}",
                format_list(&metrics.response_times.quartiles)
            )
            .ok();
        }
    }

    if !metrics.request_event_times.is_empty() {
        out.push_str("  events (time since previous event)\n");
        for (name, stats) in &metrics.request_event_times {
            writeln!(&mut out, "    {name}: {}", format_stats(stats)).ok();
        }
    }

    if !metrics.status_codes_distribution.is_empty() {
        out.push_str("  status codes\n");
        for (code, count) in &metrics.status_codes_distribution {
            writeln!(
                &mut out,
                "    {code}: {count} ({})",
                format_percent(*count, metrics.request_count())
            )
            .ok();
        }
    }

    if !metrics.request_failures.is_empty() {
        let mut reasons: BTreeMap<&str, usize> = BTreeMap::new();
        for failure in &metrics.request_failures {
            *reasons.entry(failure.reason.as_str()).or_default() += 1;
        }
        let mut reasons: Vec<_> = reasons.into_iter().collect();
        reasons.sort_by(|(a_reason, a_count), (b_reason, b_count)| {
            b_count.cmp(a_count).then_with(|| a_reason.cmp(b_reason))
        });

        out.push_str("  failures\n");
        for (reason, count) in reasons {
            writeln!(&mut out, "    {reason}: {count}").ok();
        }
    }

    if !report.tests.cases.is_empty() {
        let passed = report.tests.cases.iter().filter(|c| c.pass).count();
        writeln!(
            &mut out,
            "\ntests: {passed}/{} passed",
            report.tests.cases.len()
        )
        .ok();
        for case in &report.tests.cases {
            let mark = if case.pass { "PASS" } else { "FAIL" };
            writeln!(&mut out, "  {mark} {}: {}", case.input.name, case.summary).ok();
        }
    }

    out
}

fn format_stats(stats: &TimeStats) -> String {
    format!(
        "min={} median={} mean={} max={} stddev={}",
        format_duration(stats.min),
        format_duration(stats.median),
        format_duration(stats.mean),
        format_duration(stats.max),
        format_duration(stats.stddev)
    )
}

fn format_list(values: &[std::time::Duration]) -> String {
    values
        .iter()
        .map(|d| format_duration(*d))
        .collect::<Vec<_>>()
        .join(" ")
}
