// Machine-readable index

use std::collections::BTreeMap;

use super::PlotEntry;
use crate::masterdb::MasterDb;
use crate::models::{GraphEntry, JsonIndex, PlotScope, RunMetadata};
use crate::render;

pub fn build_index(db: &MasterDb, title: &str, plots: &[PlotEntry]) -> JsonIndex {
    let mut process_graphs = BTreeMap::new();
    let mut system_graphs = BTreeMap::new();
    for plot in plots {
        let entry = GraphEntry {
            legend: plot.legend.clone(),
            filename: render::image_name(&plot.key),
            thumbnail: render::thumbnail_name(&plot.key),
            summary: plot.summary.clone(),
        };
        match PlotScope::of_key(&plot.key) {
            PlotScope::Process => process_graphs.insert(plot.key.clone(), entry),
            PlotScope::System => system_graphs.insert(plot.key.clone(), entry),
        };
    }

    let duration = db.duration();
    JsonIndex {
        process_graphs,
        system_graphs,
        metadata: RunMetadata {
            title: title.to_string(),
            software_version: db.software_version(),
            hardware: db.hardware_identity(),
            steps: db.steps(),
            dates: db.dates(),
            dirnames: db.dirnames(),
            duration: (duration >= 0.0).then_some(duration),
            interval: Some(db.interval_stats()),
            reboots: db.reboots().iter().map(|r| r.dirname.clone()).collect(),
        },
    }
}
