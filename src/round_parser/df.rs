// Filesystem usage, from `df -k` output or the usage.csv Filesystem section

use std::collections::BTreeMap;

use super::{DF_FILE, numbered_lines};
use crate::models::{Parsed, SkippedLine};

/// `df -k` output: a `Filesystem` header, then whitespace separated rows.
pub fn parse(text: &str) -> Parsed<BTreeMap<String, u64>> {
    let lines: Vec<(usize, &str)> = numbered_lines(text).collect();
    match lines.split_first() {
        Some((&(_, header), rows)) if header.starts_with("Filesystem") => {
            parse_rows(rows, ' ', DF_FILE)
        }
        Some((&(lineno, _), _)) => Parsed::new(
            BTreeMap::new(),
            vec![SkippedLine::new(DF_FILE, lineno, "missing Filesystem header")],
        ),
        None => Parsed::default(),
    }
}

/// Used kB per mount point from `fs blocks used available use% mount` rows.
///
/// With `' '` as separator any whitespace separates columns. A device name
/// alone on a line (df wraps long names) is joined with the next row.
pub fn parse_rows(rows: &[(usize, &str)], sep: char, file: &str) -> Parsed<BTreeMap<String, u64>> {
    let mut mounts = BTreeMap::new();
    let mut skipped = Vec::new();
    let mut pending = false;

    for &(lineno, row) in rows {
        let mut cols: Vec<&str> = if sep == ' ' {
            row.split_whitespace().collect()
        } else {
            row.split(sep).map(str::trim).collect()
        };
        if cols.len() < 6 {
            if std::mem::take(&mut pending) {
                cols.retain(|c| !c.is_empty());
                if cols.len() == 5 {
                    insert_row(&mut mounts, &mut skipped, &cols, lineno, file);
                    continue;
                }
                skipped.push(SkippedLine::new(file, lineno, "wrapped row has wrong column count"));
                continue;
            }
            if cols.len() == 1 {
                pending = true;
            } else {
                skipped.push(SkippedLine::new(file, lineno, "expected 6 columns"));
            }
            continue;
        }
        pending = false;
        insert_row(&mut mounts, &mut skipped, &cols[1..], lineno, file);
    }

    Parsed::new(mounts, skipped)
}

fn insert_row(
    mounts: &mut BTreeMap<String, u64>,
    skipped: &mut Vec<SkippedLine>,
    cols: &[&str],
    lineno: usize,
    file: &str,
) {
    // cols: blocks used available use% mount...
    match cols[1].parse::<u64>() {
        Ok(used) => {
            mounts.insert(cols[4..].join(" "), used);
        }
        Err(_) => skipped.push(SkippedLine::new(file, lineno, "invalid used column")),
    }
}
