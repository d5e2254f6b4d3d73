//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.pipereview.toml` files.

use crate::analysis::{default_thresholds, validate_thresholds};
use crate::models::{AgingThreshold, Region, Stage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".pipereview.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Owner to region mapping.
    #[serde(default)]
    pub regions: RegionConfig,

    /// Aging buckets and stale thresholds.
    #[serde(default)]
    pub aging: AgingConfig,

    /// Risk and urgency thresholds.
    #[serde(default)]
    pub risk: RiskConfig,

    /// Action item synthesis.
    #[serde(default)]
    pub actions: ActionConfig,

    /// Transition report settings.
    #[serde(default)]
    pub transition: TransitionConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log at debug level without `--verbose`. `--quiet` still wins.
    #[serde(default)]
    pub verbose: bool,

    /// Default deals file when `--deals` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deals: Option<String>,

    /// Default actions file when `--actions` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<String>,
}

/// Owner to region lookup used when normalizing a raw export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Region for owners missing from the table.
    #[serde(default = "default_region")]
    pub default_region: Region,

    /// Owner name to region.
    #[serde(default = "default_owner_regions")]
    pub owners: BTreeMap<String, Region>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            owners: default_owner_regions(),
        }
    }
}

fn default_region() -> Region {
    Region::East
}

fn default_owner_regions() -> BTreeMap<String, Region> {
    let west = ["Mike Campbell", "Justin Ott", "Kim Guihen"];
    let east = [
        "Lisa Burgese Fry",
        "Avani Macwan",
        "Scott Pallardy",
        "Sherry De Luca",
        "Hovsep Kirikian",
        "Jim Macdonell",
        "Josh Ertmer",
        "Meghan Rutkowski",
        "Jeff Burton",
        "Vega Finucan",
        "Michelle Dias",
        "Jim Murray",
        "Cortney Whitehouse",
    ];
    let europe = ["Marcus Dinan", "Holger Brämer"];

    west.iter()
        .map(|name| (name.to_string(), Region::West))
        .chain(east.iter().map(|name| (name.to_string(), Region::East)))
        .chain(europe.iter().map(|name| (name.to_string(), Region::Europe)))
        .collect()
}

/// Aging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingConfig {
    /// Deals open longer than this are stale.
    #[serde(default = "default_stale_days")]
    pub stale_days: u32,

    /// Deals open longer than this are flagged as aging on owner pages.
    #[serde(default = "default_attention_days")]
    pub attention_days: u32,

    /// Day ranges for the aging distribution.
    #[serde(default = "default_thresholds")]
    pub buckets: Vec<AgingThreshold>,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            stale_days: default_stale_days(),
            attention_days: default_attention_days(),
            buckets: default_thresholds(),
        }
    }
}

fn default_stale_days() -> u32 {
    180
}

fn default_attention_days() -> u32 {
    90
}

/// Risk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Churn score at which a deal is reported as at risk.
    #[serde(default = "default_at_risk_score")]
    pub at_risk_score: u32,

    /// Deals closing within this many days are urgent.
    #[serde(default = "default_urgent_within_days")]
    pub urgent_within_days: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            at_risk_score: default_at_risk_score(),
            urgent_within_days: default_urgent_within_days(),
        }
    }
}

fn default_at_risk_score() -> u32 {
    crate::analysis::AT_RISK_SCORE
}

fn default_urgent_within_days() -> i64 {
    7
}

/// Settings for synthesizing action items when none are supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Synthesize actions for deals at or above this stage.
    #[serde(default = "default_action_stage")]
    pub stage_threshold: Stage,

    /// Maximum number of synthesized actions.
    #[serde(default = "default_action_limit")]
    pub limit: usize,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            stage_threshold: default_action_stage(),
            limit: default_action_limit(),
        }
    }
}

fn default_action_stage() -> Stage {
    Stage::Commit
}

fn default_action_limit() -> usize {
    20
}

/// Transition report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    #[serde(default = "default_priority_stage")]
    pub priority_stage: Stage,

    #[serde(default = "default_priority_amount")]
    pub priority_amount: f64,

    #[serde(default = "default_transition_accounts")]
    pub top_accounts: usize,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            priority_stage: default_priority_stage(),
            priority_amount: default_priority_amount(),
            top_accounts: default_transition_accounts(),
        }
    }
}

fn default_priority_stage() -> Stage {
    Stage::Solution
}

fn default_priority_amount() -> f64 {
    200_000.0
}

fn default_transition_accounts() -> usize {
    15
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows in "top N" tables.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Show churn-risk flags next to deals.
    #[serde(default = "default_true")]
    pub include_risk_flags: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            include_risk_flags: true,
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        validate_thresholds(&self.aging.buckets)?;

        if self.report.top_n == 0 {
            anyhow::bail!("report.top_n must be at least 1");
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(top) = args.top {
            self.report.top_n = top;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
