// X server resource usage per client (xmeminfo / usage.csv res-base section)

use std::collections::BTreeMap;

use super::{XMEMINFO_FILE, numbered_lines};
use crate::models::{Parsed, SkippedLine, XClient};

const PIXMAP: &str = "Pixmap mem";
const MISC: &str = "Misc mem";
const TOTAL: &str = "Total mem";
const PID: &str = "PID";
const TOTAL_COUNT: &str = "total_resource_count";

/// Standalone xmeminfo file: header row first.
pub fn parse(text: &str) -> Parsed<BTreeMap<String, XClient>> {
    let lines: Vec<(usize, &str)> = numbered_lines(text).collect();
    match lines.split_first() {
        Some((&(_, header), rows)) => parse_rows(header, rows, XMEMINFO_FILE),
        None => Parsed::default(),
    }
}

/// Rows keyed by the last column (client identifier, may itself contain commas).
pub fn parse_rows(
    header: &str,
    rows: &[(usize, &str)],
    file: &str,
) -> Parsed<BTreeMap<String, XClient>> {
    let columns: Vec<&str> = header.trim().split(',').map(str::trim).collect();
    let mut clients = BTreeMap::new();
    let mut skipped = Vec::new();
    if columns.len() < 2 {
        return Parsed::new(clients, skipped);
    }
    let ident = columns.len() - 1;
    let has_total_count = columns.contains(&TOTAL_COUNT);

    for &(lineno, row) in rows {
        let cols: Vec<&str> = row.trim().split(',').collect();
        if cols.len() < columns.len() {
            skipped.push(SkippedLine::new(file, lineno, "too few columns"));
            continue;
        }
        let name = cols[ident..].join(",");
        match client(&columns[..ident], &cols[..ident], has_total_count) {
            Some(c) => {
                clients.insert(name, c);
            }
            None => skipped.push(SkippedLine::new(file, lineno, "invalid X resource value")),
        }
    }

    Parsed::new(clients, skipped)
}

fn client(columns: &[&str], values: &[&str], has_total_count: bool) -> Option<XClient> {
    let mut client = XClient::default();
    let mut counts = 0;
    // column 0 is the resource base, not a number
    for (column, value) in columns.iter().zip(values).skip(1) {
        let value = value.trim();
        match *column {
            // both are part of the total, only checked
            PIXMAP | MISC => {
                bytes_to_kb(value)?;
            }
            TOTAL => client.total_kb = bytes_to_kb(value)?,
            PID => client.pid = value.parse().ok()?,
            TOTAL_COUNT => client.resource_count = value.parse().ok()?,
            _ => counts += value.parse::<u64>().ok()?,
        }
    }
    if !has_total_count {
        client.resource_count = counts;
    }
    Some(client)
}

/// `"2428324B"` → kB. Values without the trailing `B` are rejected.
fn bytes_to_kb(value: &str) -> Option<u64> {
    value.strip_suffix('B')?.parse::<u64>().ok().map(|b| b / 1024)
}
