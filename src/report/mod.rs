// Report assembly: index.json and index.html from the MasterDb and the rendered plots

mod html;
mod json;

pub use json::build_index;

use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::masterdb::MasterDb;
use crate::models::PlotSpec;

pub const JSON_INDEX: &str = "index.json";
pub const HTML_INDEX: &str = "index.html";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing {JSON_INDEX}: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the report keeps of a PlotSpec once its image exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotEntry {
    pub key: String,
    pub legend: String,
    pub summary: Option<serde_json::Value>,
}

impl From<&PlotSpec> for PlotEntry {
    fn from(spec: &PlotSpec) -> Self {
        Self {
            key: spec.key.clone(),
            legend: spec.legend.clone(),
            summary: spec.summary.clone(),
        }
    }
}

/// Write both indexes, replacing any previous ones. `plots` must only hold rendered plots.
#[instrument(
    skip_all,
    fields(operation = "write_report", out_dir = %out_dir.display(), plots = plots.len())
)]
pub fn write_report(
    out_dir: &Path,
    db: &MasterDb,
    title: &str,
    plots: &[PlotEntry],
) -> Result<(), ReportError> {
    let index = build_index(db, title, plots);

    let json_path = out_dir.join(JSON_INDEX);
    let text = serde_json::to_string_pretty(&index)?;
    std::fs::write(&json_path, text).map_err(|source| ReportError::Write {
        path: json_path.clone(),
        source,
    })?;

    let html_path = out_dir.join(HTML_INDEX);
    std::fs::write(&html_path, html::render(&index, db)).map_err(|source| {
        ReportError::Write {
            path: html_path.clone(),
            source,
        }
    })?;

    tracing::info!(
        json = %json_path.display(),
        html = %html_path.display(),
        "report written"
    );
    Ok(())
}
