//! Readiness of the loaded region set.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    Pending,
    Loading,
    Loaded,
}

/// What a health probe reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// True once every known region is loaded.
    pub healthy: bool,
    pub regions: BTreeMap<String, RegionStatus>,
}

impl ReadinessReport {
    pub fn new(regions: BTreeMap<String, RegionStatus>) -> Self {
        let healthy = regions.values().all(|s| *s == RegionStatus::Loaded);
        Self { healthy, regions }
    }

    /// Regions not yet loaded, sorted.
    pub fn waiting(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|(_, s)| **s != RegionStatus::Loaded)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
