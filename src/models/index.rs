// Machine-readable report index (index.json)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub legend: String,
    pub filename: String,
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub title: String,
    pub software_version: String,
    pub hardware: String,
    pub steps: Vec<Option<Vec<String>>>,
    pub dates: Vec<String>,
    pub dirnames: Vec<String>,
    /// Seconds between first and last round; `None` when the uptime went backwards.
    pub duration: Option<f64>,
    pub interval: Option<IntervalStats>,
    /// Directory names of rounds that follow a reboot.
    #[serde(default)]
    pub reboots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonIndex {
    pub process_graphs: BTreeMap<String, GraphEntry>,
    pub system_graphs: BTreeMap<String, GraphEntry>,
    pub metadata: RunMetadata,
}
