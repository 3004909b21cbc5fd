// Human-readable index

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::masterdb::{MasterDb, readable_duration};
use crate::models::{GraphEntry, JsonIndex};
use crate::version;

const STYLE: &str = "body{font-family:sans-serif;margin:1em 2em}\
figure{display:inline-block;margin:0.5em;text-align:center;vertical-align:top;max-width:340px}\
table{border-collapse:collapse}td,th{border:1px solid #aaa;padding:2px 6px;text-align:left}\
.reboot{color:#b00}";

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn section(h: &mut String, heading: &str, graphs: &BTreeMap<String, GraphEntry>) {
    let _ = writeln!(h, "<h2>{}</h2>", escape(heading));
    if graphs.is_empty() {
        let _ = writeln!(h, "<p>No graphs.</p>");
        return;
    }
    for entry in graphs.values() {
        let _ = writeln!(
            h,
            "<figure><a href=\"{file}\"><img src=\"{thumb}\" alt=\"{legend}\"></a><figcaption>{legend}</figcaption></figure>",
            file = escape(&entry.filename),
            thumb = escape(&entry.thumbnail),
            legend = escape(&entry.legend),
        );
    }
}

pub fn render(index: &JsonIndex, db: &MasterDb) -> String {
    let meta = &index.metadata;
    let mut h = String::new();
    let _ = writeln!(h, "<!DOCTYPE html>");
    let _ = writeln!(h, "<html><head><meta charset=\"utf-8\">");
    let _ = writeln!(h, "<title>{}</title>", escape(&meta.title));
    let _ = writeln!(h, "<style>{STYLE}</style></head><body>");
    let _ = writeln!(h, "<h1>{}</h1>", escape(&meta.title));

    if !meta.software_version.is_empty() {
        let software = escape(&meta.software_version);
        let _ = writeln!(h, "<p class=\"software\">Software: {software}</p>");
    }
    if !meta.hardware.is_empty() {
        let _ = writeln!(h, "<p class=\"hardware\">Hardware: {}</p>", escape(&meta.hardware));
    }

    let _ = writeln!(h, "<ul class=\"summary\">");
    let _ = writeln!(h, "<li>Rounds: {}</li>", meta.dirnames.len());
    match meta.duration {
        Some(secs) => {
            let _ = writeln!(h, "<li>Duration: {} ({secs:.0} s)</li>", readable_duration(secs));
        }
        None => {
            let _ = writeln!(
                h,
                "<li class=\"reboot\">Duration: unknown, uptime went backwards (device rebooted during the run)</li>"
            );
        }
    }
    if let Some(secs) = db.wall_clock()
        && secs > 0.0
    {
        let _ = writeln!(h, "<li>Wall-clock time: {} ({secs:.0} s)</li>", readable_duration(secs));
    }
    if let Some(i) = meta.interval {
        let _ = writeln!(
            h,
            "<li>Round interval: average {:.0} s, min {:.0} s, max {:.0} s</li>",
            i.avg, i.min, i.max
        );
    }
    let _ = writeln!(h, "</ul>");

    if !db.reboots().is_empty() {
        let _ = writeln!(
            h,
            "<div class=\"reboot\"><p>Reboots detected before these rounds:</p><ul>"
        );
        for r in db.reboots() {
            let _ = writeln!(
                h,
                "<li>{} (uptime {:.0} s after {:.0} s)</li>",
                escape(&r.dirname),
                r.uptime,
                r.previous_uptime
            );
        }
        let _ = writeln!(h, "</ul><p>Only compare rounds between reboots.</p></div>");
    }

    section(&mut h, "Process graphs", &index.process_graphs);
    section(&mut h, "System graphs", &index.system_graphs);

    let _ = writeln!(h, "<h2>Rounds</h2>");
    let _ = writeln!(h, "<table><tr><th>#</th><th>Directory</th><th>Date</th><th>Step</th></tr>");
    for (i, dirname) in meta.dirnames.iter().enumerate() {
        let date = meta.dates.get(i).map(String::as_str).unwrap_or("");
        let step = meta
            .steps
            .get(i)
            .and_then(|s| s.as_ref())
            .map(|lines| lines.iter().map(|l| escape(l)).collect::<Vec<_>>().join("<br>"))
            .unwrap_or_default();
        let _ = writeln!(
            h,
            "<tr><td>{i}</td><td>{}</td><td>{}</td><td>{step}</td></tr>",
            escape(dirname),
            escape(date)
        );
    }
    let _ = writeln!(h, "</table>");
    let tag = escape(&version::generator_tag());
    let _ = writeln!(h, "<footer><p>Generated by {tag}</p></footer>");
    let _ = writeln!(h, "</body></html>");
    h
}
