// Plot specifications: what a generator hands to the renderer

use serde::Serialize;

/// Report section a plot belongs to. Derived from the key only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotScope {
    Process,
    System,
}

impl PlotScope {
    /// Keys with a leading `1` are per-process plots, anything else is system wide.
    pub fn of_key(key: &str) -> Self {
        if key.starts_with('1') {
            PlotScope::Process
        } else {
            PlotScope::System
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotStyle {
    /// One line per series.
    Lines,
    /// Series stacked on top of each other per round.
    Stacked,
}

/// One data series. `values[i]` belongs to round `i`; `None` means no sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn new(label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::max)
    }

    pub fn first(&self) -> Option<f64> {
        self.values.iter().flatten().copied().next()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.iter().rev().flatten().copied().next()
    }
}

/// Declarative render instructions. Backend specific script text is produced by `render::script`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderCommand {
    pub title: String,
    /// Global label shared by every plot of the run (software version, device). Already escaped
    /// for a gnuplot double-quoted string.
    pub subtitle: String,
    pub ylabel: String,
    pub style: PlotStyle,
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub width: u32,
    pub height: u32,
    /// Number of x positions (rounds).
    pub points: usize,
    /// Labelled x positions.
    pub xtics: Vec<(usize, String)>,
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSpec {
    /// Stable identifier; file names derive from it.
    pub key: String,
    pub legend: String,
    pub command: RenderCommand,
    pub summary: Option<serde_json::Value>,
}

impl PlotSpec {
    pub fn scope(&self) -> PlotScope {
        PlotScope::of_key(&self.key)
    }
}
