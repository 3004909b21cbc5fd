// ifconfig output: bytes transferred per interface

use std::collections::BTreeMap;

use super::{IFCONFIG_FILE, numbered_lines};
use crate::models::{Parsed, SkippedLine};

/// Bytes received plus transmitted per interface; loopback is left out.
///
/// Accepts both the old `RX bytes:N (..) TX bytes:M` layout and the newer
/// `RX packets N  bytes M` / `TX packets N  bytes M` one.
pub fn parse(text: &str) -> Parsed<BTreeMap<String, u64>> {
    let mut transfers = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut interface: Option<String> = None;

    for (lineno, line) in numbered_lines(text) {
        if !line.starts_with(char::is_whitespace) {
            interface = line
                .split_whitespace()
                .next()
                .map(|n| n.trim_end_matches(':').to_string())
                .filter(|n| n != "lo");
            continue;
        }
        let Some(name) = interface.as_deref() else { continue };
        let line = line.trim();
        let bytes = if line.starts_with("RX bytes:") {
            let rx = labelled(line, "RX bytes:");
            let tx = labelled(line, "TX bytes:");
            rx.zip(tx).map(|(rx, tx)| rx + tx)
        } else if line.starts_with("RX packets ") || line.starts_with("TX packets ") {
            labelled(line, "bytes")
        } else {
            continue;
        };
        match bytes {
            Some(b) => *transfers.entry(name.to_string()).or_insert(0) += b,
            None => skipped.push(SkippedLine::new(IFCONFIG_FILE, lineno, "invalid byte counter")),
        }
    }

    Parsed::new(transfers, skipped)
}

/// Number following `label`, with or without a separating space.
fn labelled(line: &str, label: &str) -> Option<u64> {
    let rest = &line[line.find(label)? + label.len()..];
    rest.split_whitespace().next()?.trim_start_matches(':').parse().ok()
}
