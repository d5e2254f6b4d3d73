//! Raw export normalization and action synthesis.

use crate::analysis::queue_order;
use crate::config::{ActionConfig, RegionConfig};
use crate::models::{
    default_forecast_category, ActionItem, ActionStatus, Deal, RawDeal, Region, Stage,
};
use chrono::{Duration, NaiveDate};

/// Newly derived deals have not been in their stage longer than this.
const DAYS_IN_STAGE_CAP: u32 = 30;

/// Derive the numeric stage from a CRM stage label.
///
/// The first of '1'..'4' found in the label wins, checked in that order;
/// labels with no digit map to stage 1.
pub fn stage_from_name(stage_name: Option<&str>) -> Stage {
    let Some(name) = stage_name else {
        return Stage::Sourcing;
    };

    [
        ('1', Stage::Sourcing),
        ('2', Stage::Qualifying),
        ('3', Stage::Solution),
        ('4', Stage::Commit),
    ]
    .iter()
    .find(|(digit, _)| name.contains(*digit))
    .map(|(_, stage)| *stage)
    .unwrap_or(Stage::Sourcing)
}

/// Look up an owner's region, falling back to the configured default.
pub fn region_of(owner: &str, regions: &RegionConfig) -> Region {
    regions
        .owners
        .get(owner)
        .copied()
        .unwrap_or(regions.default_region)
}

/// Convert raw export records into deals, sorted in review queue order.
///
/// Ids are assigned from the export order (`deal-001`, `deal-002`, ...)
/// before sorting.
pub fn transform_raw(raw: Vec<RawDeal>, regions: &RegionConfig) -> Vec<Deal> {
    let mut deals: Vec<Deal> = raw
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let days_open = record.days_open.unwrap_or(0);
            Deal {
                id: format!("deal-{:03}", index + 1),
                stage: stage_from_name(record.stage_name.as_deref()),
                region: region_of(&record.owner_name, regions),
                opportunity_id: record.opportunity_id,
                opportunity_name: record.opportunity_name,
                account_name: record.account_name,
                amount: record.amount.unwrap_or(0.0),
                egp: record.egp.unwrap_or(0.0),
                close_date: record.close_date,
                stage_name: record.stage_name,
                owner: record.owner_name,
                forecast_category: record
                    .forecast_category
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(default_forecast_category),
                days_open,
                days_in_stage: days_open.min(DAYS_IN_STAGE_CAP),
                reviewed: false,
                meddpicc: None,
                notes: None,
            }
        })
        .collect();

    deals.sort_by(queue_order);
    deals
}

/// Seed follow-up actions for the highest-stage deals.
///
/// Takes deals at or above the configured stage in review queue order, up to
/// the configured limit. Due dates are spread one day apart from `today`.
pub fn synthesize_actions(
    deals: &[Deal],
    config: &ActionConfig,
    today: NaiveDate,
) -> Vec<ActionItem> {
    let mut eligible: Vec<&Deal> = deals
        .iter()
        .filter(|d| d.stage >= config.stage_threshold)
        .collect();
    eligible.sort_by(|a, b| queue_order(a, b));

    eligible
        .into_iter()
        .take(config.limit)
        .enumerate()
        .map(|(i, deal)| ActionItem {
            id: format!("action-{:03}", i + 1),
            deal_id: deal.id.clone(),
            deal_name: deal.opportunity_name.clone(),
            action: if deal.is_commit_forecast() {
                "Confirm close date with customer".to_string()
            } else {
                "Complete MEDDPICC review".to_string()
            },
            owner: deal.owner.clone(),
            due_date: today + Duration::days(i as i64 + 1),
            status: ActionStatus::Pending,
        })
        .collect()
}
