//! Churn-risk scoring.
//!
//! Each signal contributes one tier at most: the highest age tier that
//! applies, the highest stage-stagnation tier that applies, and the
//! missing-EGP flag.

use crate::models::Deal;
use serde::{Deserialize, Serialize};

use super::aggregator::queue_order;

/// Score at or above which a deal needs attention.
pub const AT_RISK_SCORE: u32 = 2;

/// Deals above this amount are expected to carry an EGP estimate.
const NO_EGP_AMOUNT: f64 = 100_000.0;

/// Result of scoring a single deal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnRisk {
    pub risk_score: u32,
    pub flags: Vec<String>,
}

impl ChurnRisk {
    fn add(&mut self, points: u32, flag: &str) {
        self.risk_score += points;
        self.flags.push(flag.to_string());
    }

    pub fn is_at_risk(&self, min_score: u32) -> bool {
        self.risk_score >= min_score
    }
}

/// Score a deal on age, stage stagnation, and missing EGP.
pub fn score_churn_risk(deal: &Deal) -> ChurnRisk {
    let mut risk = ChurnRisk::default();

    if deal.days_open > 365 {
        risk.add(3, "365+ days");
    } else if deal.days_open > 180 {
        risk.add(2, "180+ days");
    } else if deal.days_open > 90 {
        risk.add(1, "90+ days");
    }

    if deal.days_in_stage > 60 {
        risk.add(2, "Stuck in stage");
    } else if deal.days_in_stage > 30 {
        risk.add(1, "Slow stage progress");
    }

    if deal.egp == 0.0 && deal.amount > NO_EGP_AMOUNT {
        risk.add(1, "No EGP set");
    }

    risk
}

/// Deals scoring at or above `min_score`, highest score first, then queue order.
pub fn at_risk_deals(deals: &[Deal], min_score: u32) -> Vec<(&Deal, ChurnRisk)> {
    let mut scored: Vec<(&Deal, ChurnRisk)> = deals
        .iter()
        .map(|d| (d, score_churn_risk(d)))
        .filter(|(_, risk)| risk.is_at_risk(min_score))
        .collect();

    scored.sort_by(|(a, ra), (b, rb)| {
        rb.risk_score
            .cmp(&ra.risk_score)
            .then_with(|| queue_order(a, b))
    });

    scored
}
