//! Data models for the pipeline review.
//!
//! This module contains the core data structures used throughout
//! the application: deals, action items, and the summaries derived from them.

use crate::error::PipelineError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sales region a deal is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    West,
    East,
    Europe,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::West, Region::East, Region::Europe];
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::West => write!(f, "West"),
            Region::East => write!(f, "East"),
            Region::Europe => write!(f, "Europe"),
        }
    }
}

impl FromStr for Region {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "west" => Ok(Region::West),
            "east" => Ok(Region::East),
            "europe" => Ok(Region::Europe),
            _ => Err(PipelineError::InvalidRegion(s.to_string())),
        }
    }
}

/// Pipeline stage. Numbered 1 through 4; datasets that stop at stage 3
/// are a valid subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    /// 1 - sourcing the lead
    Sourcing,
    /// 2 - qualifying the opportunity
    Qualifying,
    /// 3 - developing and presenting a solution
    Solution,
    /// 4 - commit / negotiating
    Commit,
}

impl Stage {
    /// Stages from highest priority to lowest.
    pub const DESCENDING: [Stage; 4] = [
        Stage::Commit,
        Stage::Solution,
        Stage::Qualifying,
        Stage::Sourcing,
    ];

    pub fn number(&self) -> u8 {
        match self {
            Stage::Sourcing => 1,
            Stage::Qualifying => 2,
            Stage::Solution => 3,
            Stage::Commit => 4,
        }
    }

    /// Short label used in report tables.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Sourcing => "Source",
            Stage::Qualifying => "Qualify",
            Stage::Solution => "Solution",
            Stage::Commit => "Commit",
        }
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Stage::Sourcing),
            2 => Ok(Stage::Qualifying),
            3 => Ok(Stage::Solution),
            4 => Ok(Stage::Commit),
            other => Err(format!("stage must be between 1 and 4, got {}", other)),
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {} - {}", self.number(), self.label())
    }
}

/// MEDDPICC flags as they may appear inline in a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeddpiccFlags {
    pub metrics: bool,
    pub economic_buyer: bool,
    pub decision_criteria: bool,
    pub decision_process: bool,
    pub paper_process: bool,
    pub identify_pain: bool,
    pub champion: bool,
    pub competition: bool,
}

/// A single opportunity in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    /// Unique identifier (e.g. `deal-001`).
    pub id: String,
    /// CRM opportunity id, when the deal came from an export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity_id: Option<String>,
    pub opportunity_name: String,
    pub account_name: String,
    /// Deal value in currency units.
    #[serde(default)]
    pub amount: f64,
    /// Estimated gross profit in currency units.
    #[serde(default)]
    pub egp: f64,
    /// Expected or actual close date.
    pub close_date: NaiveDate,
    pub stage: Stage,
    /// CRM stage label the numeric stage was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    pub owner: String,
    pub region: Region,
    #[serde(default = "default_forecast_category")]
    pub forecast_category: String,
    #[serde(default)]
    pub days_open: u32,
    #[serde(default)]
    pub days_in_stage: u32,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meddpicc: Option<MeddpiccFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

pub(crate) fn default_forecast_category() -> String {
    "Pipeline".to_string()
}

impl Deal {
    /// EGP as a percentage of amount (0 when amount is 0).
    pub fn margin_percent(&self) -> f64 {
        percent(self.egp, self.amount)
    }

    pub fn is_commit_forecast(&self) -> bool {
        self.forecast_category.eq_ignore_ascii_case("commit")
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Status of an action item as stored in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    /// Accepted from data for compatibility; overdue is derived at read time.
    Overdue,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Pending => write!(f, "Pending"),
            ActionStatus::InProgress => write!(f, "In Progress"),
            ActionStatus::Completed => write!(f, "Completed"),
            ActionStatus::Overdue => write!(f, "Overdue"),
        }
    }
}

/// A follow-up task tied to a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub id: String,
    pub deal_id: String,
    #[serde(default)]
    pub deal_name: String,
    /// Free-text task description.
    pub action: String,
    pub owner: String,
    pub due_date: NaiveDate,
    pub status: ActionStatus,
}

/// A record from the raw CRM export, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeal {
    #[serde(default)]
    pub opportunity_id: Option<String>,
    #[serde(default)]
    pub opportunity_name: String,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default, rename = "eGP")]
    pub egp: Option<f64>,
    pub close_date: NaiveDate,
    #[serde(default)]
    pub stage_name: Option<String>,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub forecast_category: Option<String>,
    #[serde(default)]
    pub days_open: Option<u32>,
}

/// Deal counts per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub stage1: usize,
    pub stage2: usize,
    pub stage3: usize,
    pub stage4: usize,
}

impl StageCounts {
    pub fn get(&self, stage: Stage) -> usize {
        match stage {
            Stage::Sourcing => self.stage1,
            Stage::Qualifying => self.stage2,
            Stage::Solution => self.stage3,
            Stage::Commit => self.stage4,
        }
    }

    pub fn increment(&mut self, stage: Stage) {
        match stage {
            Stage::Sourcing => self.stage1 += 1,
            Stage::Qualifying => self.stage2 += 1,
            Stage::Solution => self.stage3 += 1,
            Stage::Commit => self.stage4 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stage1 + self.stage2 + self.stage3 + self.stage4
    }
}

/// Deal counts per region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub west: usize,
    pub east: usize,
    pub europe: usize,
}

impl RegionCounts {
    pub fn get(&self, region: Region) -> usize {
        match region {
            Region::West => self.west,
            Region::East => self.east,
            Region::Europe => self.europe,
        }
    }

    pub fn increment(&mut self, region: Region) {
        match region {
            Region::West => self.west += 1,
            Region::East => self.east += 1,
            Region::Europe => self.europe += 1,
        }
    }
}

/// Rollup over a group of deals (a region, an owner, or any subset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub deal_count: usize,
    pub total_amount: f64,
    pub total_egp: f64,
    /// `total_amount / deal_count`, 0 for an empty group.
    pub avg_deal_size: f64,
    /// Mean of `days_open`, 0 for an empty group.
    pub avg_days_open: f64,
    pub by_stage: StageCounts,
    pub by_region: RegionCounts,
    pub reviewed_count: usize,
    pub pending_count: usize,
    /// Sum of amount over Commit-stage deals.
    pub stage4_pipeline: f64,
    /// `total_egp / total_amount * 100`, 0 when there is no amount.
    pub margin_percent: f64,
}

/// Rollup for a single customer account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetrics {
    pub account_name: String,
    pub deal_count: usize,
    pub total_amount: f64,
    pub total_egp: f64,
    pub stage_histogram: StageCounts,
    /// Ids of the account's deals, in dataset order.
    pub deal_ids: Vec<String>,
}

/// Whole-pipeline totals consumed by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub deal_count: usize,
    pub total_amount: f64,
    pub total_egp: f64,
    pub margin_percent: f64,
    pub avg_deal_size: f64,
    pub by_stage: StageCounts,
    pub by_region: RegionCounts,
    pub reviewed_count: usize,
    pub pending_count: usize,
    pub commit_count: usize,
    pub commit_amount: f64,
}

/// One row of the velocity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMetrics {
    pub stage: Stage,
    pub deal_count: usize,
    pub total_amount: f64,
    pub total_egp: f64,
    pub avg_days_open: f64,
}

/// Inclusive day range for an aging bucket. `max = None` is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingThreshold {
    pub label: String,
    pub min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl AgingThreshold {
    pub fn new(label: &str, min: u32, max: Option<u32>) -> Self {
        Self {
            label: label.to_string(),
            min,
            max,
        }
    }

    pub fn contains(&self, days: u32) -> bool {
        days >= self.min && self.max.map_or(true, |max| days <= max)
    }
}

/// Deals falling into one aging range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingBucket {
    pub label: String,
    pub min: u32,
    pub max: Option<u32>,
    pub deal_count: usize,
    pub total_amount: f64,
    /// Share of all deals, 0 for an empty collection.
    pub percent_of_total: f64,
}
