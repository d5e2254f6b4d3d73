//! Dataset loading.
//!
//! This module reads deal and action files from disk, converts raw CRM
//! exports into deals, and enforces the invariants the aggregator relies on.

mod transform;

pub use transform::synthesize_actions;
use transform::transform_raw;

use crate::config::RegionConfig;
use crate::models::{ActionItem, Deal, RawDeal};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Shape of the deals file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DealFormat {
    /// Normalized deal records.
    #[default]
    Deals,
    /// Raw CRM export records that still need stage/region derivation.
    RawExport,
}

/// Loader for the deal and action datasets.
pub struct DatasetLoader {
    regions: RegionConfig,
}

impl DatasetLoader {
    /// Create a loader using the given owner to region mapping.
    pub fn new(regions: RegionConfig) -> Self {
        Self { regions }
    }

    /// Load and normalize deals.
    pub fn load_deals(&self, path: &Path, format: DealFormat) -> Result<Vec<Deal>> {
        let deals = match format {
            DealFormat::Deals => read_json::<Vec<Deal>>(path)?,
            DealFormat::RawExport => {
                let raw: Vec<RawDeal> = read_json(path)?;
                debug!("Transforming {} raw export records", raw.len());
                transform_raw(raw, &self.regions)
            }
        };

        info!("Loaded {} deals from {}", deals.len(), path.display());
        Ok(normalize(deals))
    }

    /// Load action items.
    pub fn load_actions(&self, path: &Path) -> Result<Vec<ActionItem>> {
        let actions: Vec<ActionItem> = read_json(path)?;
        info!("Loaded {} actions from {}", actions.len(), path.display());
        Ok(actions)
    }
}

/// Read a JSON file, tolerating a leading byte-order mark.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content = content.trim_start_matches('\u{feff}');

    serde_json::from_str(content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Enforce load-time invariants: `days_in_stage` never exceeds `days_open`.
///
/// Duplicate ids are kept (lookups return the first) but logged.
pub fn normalize(mut deals: Vec<Deal>) -> Vec<Deal> {
    let mut seen = HashSet::new();

    for deal in &mut deals {
        if deal.days_in_stage > deal.days_open {
            warn!(
                "Deal {} has {} days in stage but only {} days open; clamping",
                deal.id, deal.days_in_stage, deal.days_open
            );
            deal.days_in_stage = deal.days_open;
        }

        if !seen.insert(deal.id.clone()) {
            warn!("Duplicate deal id {}; lookups return the first", deal.id);
        }
    }

    deals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Region, Stage};
    use tempfile::TempDir;

    const DEALS_FIXTURE: &str = include_str!("../../fixtures/deals.json");
    const RAW_FIXTURE: &str = include_str!("../../fixtures/raw-deals.json");
    const ACTIONS_FIXTURE: &str = include_str!("../../fixtures/actions.json");

    fn write_fixture(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_deals() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(&temp_dir, "deals.json", DEALS_FIXTURE);

        let loader = DatasetLoader::new(RegionConfig::default());
        let deals = loader.load_deals(&path, DealFormat::Deals).unwrap();

        assert_eq!(deals.len(), 8);
        assert_eq!(deals[0].id, "deal-001");
        assert!(deals.iter().all(|d| d.days_in_stage <= d.days_open));
    }

    #[test]
    fn test_load_raw_export_with_bom() {
        let temp_dir = TempDir::new().unwrap();
        let content = format!("\u{feff}{}", RAW_FIXTURE);
        let path = write_fixture(&temp_dir, "raw-deals.json", &content);

        let loader = DatasetLoader::new(RegionConfig::default());
        let deals = loader.load_deals(&path, DealFormat::RawExport).unwrap();

        assert_eq!(deals.len(), 4);
        assert_eq!(deals[0].stage, Stage::Commit);
        assert!(deals.iter().any(|d| d.region == Region::Europe));
    }

    #[test]
    fn test_load_actions() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(&temp_dir, "actions.json", ACTIONS_FIXTURE);

        let loader = DatasetLoader::new(RegionConfig::default());
        let actions = loader.load_actions(&path).unwrap();
        assert_eq!(actions.len(), 4);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = DatasetLoader::new(RegionConfig::default());
        let err = loader
            .load_deals(Path::new("/nonexistent/deals.json"), DealFormat::Deals)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_fixture(&temp_dir, "deals.json", "[{\"id\": \"deal-001\"}]");

        let loader = DatasetLoader::new(RegionConfig::default());
        let err = loader.load_deals(&path, DealFormat::Deals).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_normalize_clamps_days_in_stage() {
        let mut deals: Vec<Deal> = serde_json::from_str(DEALS_FIXTURE).unwrap();
        deals[0].days_open = 5;
        deals[0].days_in_stage = 40;

        let deals = normalize(deals);
        assert_eq!(deals[0].days_in_stage, 5);
    }

    #[test]
    fn test_normalize_keeps_duplicate_ids() {
        let mut deals: Vec<Deal> = serde_json::from_str(DEALS_FIXTURE).unwrap();
        let count = deals.len();
        let mut duplicate = deals[1].clone();
        duplicate.id = deals[0].id.clone();
        duplicate.amount = 1.0;
        deals.push(duplicate);

        let deals = normalize(deals);
        assert_eq!(deals.len(), count + 1);

        let found = crate::analysis::lookup_by_id(&deals, "deal-001").unwrap();
        assert_eq!(found.amount, 450_000.0);
        assert_eq!(deals[count].id, "deal-001");
    }
}
