// Pure aggregate helpers over uptime deltas

use crate::models::IntervalStats;

/// Average, min and max of the deltas. `None` for an empty slice.
pub fn interval_stats(deltas: &[f64]) -> Option<IntervalStats> {
    if deltas.is_empty() {
        return None;
    }
    Some(IntervalStats {
        avg: mean_f64(deltas),
        min: deltas.iter().copied().fold(f64::INFINITY, f64::min),
        max: deltas.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

fn mean_f64(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

const UNITS: [(&str, u64); 5] = [
    ("weeks", 7 * 24 * 3600),
    ("days", 24 * 3600),
    ("hours", 3600),
    ("minutes", 60),
    ("seconds", 1),
];

/// "1 weeks, 2 hours, 5 seconds": whole seconds split into units, zero units left out.
pub fn readable_duration(seconds: f64) -> String {
    let mut rest = seconds.max(0.0) as u64;
    let mut parts = Vec::new();
    for (name, size) in UNITS {
        let n = rest / size;
        rest %= size;
        if n > 0 {
            parts.push(format!("{n} {name}"));
        }
    }
    if parts.is_empty() {
        return "0 seconds".into();
    }
    parts.join(", ")
}
