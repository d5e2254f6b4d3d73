//! Hand-off report for an owner leaving the team.

use crate::models::{AccountMetrics, Deal, Metrics, Stage, StageMetrics};
use serde::{Deserialize, Serialize};

use super::aggregator::{
    compute_metrics, compute_stage_metrics, deals_for_owner, sorted_deals, top_accounts,
};
use super::aging::aging_deals;

/// Which of an owner's deals need reassigning first.
#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    /// Deals at or above this stage are priority.
    pub priority_stage: Stage,
    /// Deals at or above this amount are priority regardless of stage.
    pub priority_amount: f64,
    /// How many accounts to list.
    pub top_accounts: usize,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            priority_stage: Stage::Solution,
            priority_amount: 200_000.0,
            top_accounts: 15,
        }
    }
}

impl From<&crate::config::TransitionConfig> for TransitionPolicy {
    fn from(config: &crate::config::TransitionConfig) -> Self {
        Self {
            priority_stage: config.priority_stage,
            priority_amount: config.priority_amount,
            top_accounts: config.top_accounts,
        }
    }
}

/// Count and amount of deals past an age threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingSlice {
    pub min_days: u32,
    pub deal_count: usize,
    pub total_amount: f64,
}

impl AgingSlice {
    fn over(deals: &[&Deal], min_days: u32) -> Self {
        let aging = aging_deals(deals.iter().copied(), min_days);
        Self {
            min_days,
            deal_count: aging.len(),
            total_amount: aging.iter().map(|d| d.amount).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReport {
    pub owner: String,
    pub metrics: Metrics,
    /// Stage breakdown, highest stage first, empty stages omitted.
    pub stages: Vec<StageMetrics>,
    pub top_accounts: Vec<AccountMetrics>,
    /// Deals to hand off first, in review queue order.
    pub priority_deals: Vec<Deal>,
    pub aging: Vec<AgingSlice>,
}

/// Build the hand-off report. `None` when the owner has no deals.
pub fn compute_transition_report(
    deals: &[Deal],
    owner: &str,
    policy: &TransitionPolicy,
) -> Option<TransitionReport> {
    let owned = deals_for_owner(deals, owner);
    if owned.is_empty() {
        return None;
    }

    let priority_deals = sorted_deals(owned.iter().copied())
        .into_iter()
        .filter(|d| d.stage >= policy.priority_stage || d.amount >= policy.priority_amount)
        .cloned()
        .collect();

    let stages = compute_stage_metrics(owned.iter().copied())
        .into_iter()
        .filter(|s| s.deal_count > 0)
        .collect();

    Some(TransitionReport {
        owner: owner.to_string(),
        metrics: compute_metrics(owned.iter().copied()),
        stages,
        top_accounts: top_accounts(owned.iter().copied(), policy.top_accounts),
        priority_deals,
        aging: vec![AgingSlice::over(&owned, 90), AgingSlice::over(&owned, 180)],
    })
}
