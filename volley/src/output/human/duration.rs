use std::time::Duration;

/// Renders `d` as one rounded component in ns, us, ms or s.
pub(crate) fn format_duration(d: Duration) -> String {
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    // Ties round up.
    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= 10 * NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_S {
        return format!("{:.2}s", total_ns as f64 / NS_PER_S as f64);
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }
    if total_ns >= NS_PER_US {
        return format!("{}us", round_div(total_ns, NS_PER_US));
    }
    format!("{total_ns}ns")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_a_single_unit() {
        assert_eq!(format_duration(Duration::ZERO), "0ns");
        assert_eq!(format_duration(Duration::from_nanos(400)), "400ns");
        assert_eq!(format_duration(Duration::from_micros(1_499)), "1ms");
        assert_eq!(format_duration(Duration::from_micros(1_500)), "2ms");
        assert_eq!(format_duration(Duration::from_millis(1_234)), "1.23s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
    }
}
