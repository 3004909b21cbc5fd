// Render command files: RenderCommand -> gnuplot script with an inline datablock

use std::fmt::Write as _;
use std::path::Path;

use crate::config::Backend;
use crate::models::{PlotStyle, RenderCommand};

/// Marker for a missing sample in the datablock.
pub const MISSING: &str = "-";

pub fn command_file_name(key: &str) -> String {
    format!("{key}.gp")
}

pub fn image_name(key: &str) -> String {
    format!("{key}.png")
}

pub fn thumbnail_name(key: &str) -> String {
    format!("{key}_thumb.png")
}

fn terminal(backend: Backend) -> &'static str {
    match backend {
        // labels carry process and job names, so no enhanced-text markup
        Backend::Cairo => "pngcairo noenhanced font \"sans,9\"",
        Backend::Gd => "png small noenhanced",
    }
}

/// Body of a gnuplot double-quoted string.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", escape(s))
}

fn number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.3}")
    }
}

/// Full script for one plot; it writes its image to `image`.
pub fn script(cmd: &RenderCommand, backend: Backend, image: &Path) -> String {
    let mut s = String::new();
    // writing to a String cannot fail
    let _ = writeln!(s, "set terminal {} size {},{}", terminal(backend), cmd.width, cmd.height);
    let _ = writeln!(s, "set output {}", quoted(&image.to_string_lossy()));
    // the subtitle arrives escaped
    let mut title = escape(&cmd.title);
    if !cmd.subtitle.is_empty() {
        title.push_str("\\n");
        title.push_str(&cmd.subtitle);
    }
    let _ = writeln!(s, "set title \"{title}\"");
    let _ = writeln!(s, "set ylabel {}", quoted(&cmd.ylabel));
    let _ = writeln!(s, "set datafile missing {}", quoted(MISSING));
    let _ = writeln!(s, "set key outside right top");
    let _ = writeln!(s, "set grid ytics");
    let y_min = cmd.y_min.map(number).unwrap_or_else(|| "*".into());
    let y_max = cmd.y_max.map(number).unwrap_or_else(|| "*".into());
    let _ = writeln!(s, "set yrange [{y_min}:{y_max}]");
    if cmd.points > 0 {
        let _ = writeln!(s, "set xrange [-0.5:{}]", cmd.points as f64 - 0.5);
    }
    if !cmd.xtics.is_empty() {
        let tics: Vec<String> = cmd
            .xtics
            .iter()
            .map(|(i, label)| format!("{} {}", quoted(label), i))
            .collect();
        let _ = writeln!(s, "set xtics rotate by -45 ({})", tics.join(", "));
    }
    if cmd.style == PlotStyle::Stacked {
        let _ = writeln!(s, "set style data histograms");
        let _ = writeln!(s, "set style histogram rowstacked");
        let _ = writeln!(s, "set style fill solid 0.8 border -1");
        let _ = writeln!(s, "set boxwidth 0.8");
    }

    let _ = writeln!(s, "$data << EOD");
    for i in 0..cmd.points {
        let mut row = i.to_string();
        for series in &cmd.series {
            row.push(' ');
            match series.values.get(i).copied().flatten() {
                Some(v) => row.push_str(&number(v)),
                None => row.push_str(MISSING),
            }
        }
        let _ = writeln!(s, "{row}");
    }
    let _ = writeln!(s, "EOD");

    let clauses: Vec<String> = cmd
        .series
        .iter()
        .enumerate()
        .map(|(n, series)| {
            let source = if n == 0 { "$data" } else { "''" };
            match cmd.style {
                PlotStyle::Lines => format!(
                    "{source} using 1:{} with linespoints title {}",
                    n + 2,
                    quoted(&series.label)
                ),
                PlotStyle::Stacked => {
                    format!("{source} using {} title {}", n + 2, quoted(&series.label))
                }
            }
        })
        .collect();
    let _ = writeln!(s, "plot {}", clauses.join(", \\\n     "));
    s
}
