//! Session review state.
//!
//! Reviewed flags, notes, and the MEDDPICC checklist live in an overlay keyed
//! by deal id. The loaded deals are never modified; [`ReviewOverlay::apply`]
//! returns copies with the overlay's reviewed flags merged in.

use crate::models::{Deal, MeddpiccFlags};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// The eight MEDDPICC qualification criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Criterion {
    Metrics,
    EconomicBuyer,
    DecisionCriteria,
    DecisionProcess,
    PaperProcess,
    IdentifiedPain,
    Champion,
    Competition,
}

impl Criterion {
    pub const ALL: [Criterion; 8] = [
        Criterion::Metrics,
        Criterion::EconomicBuyer,
        Criterion::DecisionCriteria,
        Criterion::DecisionProcess,
        Criterion::PaperProcess,
        Criterion::IdentifiedPain,
        Criterion::Champion,
        Criterion::Competition,
    ];

    /// The question a rep answers to check this criterion off.
    pub fn question(&self) -> &'static str {
        match self {
            Criterion::Metrics => "Do we understand their success metrics?",
            Criterion::EconomicBuyer => "Have we identified the decision maker?",
            Criterion::DecisionCriteria => "Do we know how they will decide?",
            Criterion::DecisionProcess => "Do we know the timeline and steps?",
            Criterion::PaperProcess => "Do we understand procurement?",
            Criterion::IdentifiedPain => "Is there a compelling event?",
            Criterion::Champion => "Do we have an internal advocate?",
            Criterion::Competition => "Do we know who else they are talking to?",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Criterion::Metrics => "Metrics",
            Criterion::EconomicBuyer => "Economic Buyer",
            Criterion::DecisionCriteria => "Decision Criteria",
            Criterion::DecisionProcess => "Decision Process",
            Criterion::PaperProcess => "Paper Process",
            Criterion::IdentifiedPain => "Identified Pain",
            Criterion::Champion => "Champion",
            Criterion::Competition => "Competition",
        };
        write!(f, "{}", label)
    }
}

/// State of one checklist criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionState {
    pub addressed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// MEDDPICC checklist with exactly one entry per criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meddpicc {
    criteria: [CriterionState; 8],
}

impl Meddpicc {
    pub fn get(&self, criterion: Criterion) -> &CriterionState {
        &self.criteria[criterion.index()]
    }

    pub fn get_mut(&mut self, criterion: Criterion) -> &mut CriterionState {
        &mut self.criteria[criterion.index()]
    }

    pub fn addressed_count(&self) -> usize {
        Criterion::ALL
            .iter()
            .filter(|c| self.get(**c).addressed)
            .count()
    }

    /// Percentage of criteria addressed, rounded.
    pub fn qualification_score(&self) -> u32 {
        ((self.addressed_count() as f64 / Criterion::ALL.len() as f64) * 100.0).round() as u32
    }

    /// Criteria with their state, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Criterion, &CriterionState)> {
        Criterion::ALL.into_iter().zip(self.criteria.iter())
    }
}

impl From<MeddpiccFlags> for Meddpicc {
    fn from(flags: MeddpiccFlags) -> Self {
        let addressed = [
            flags.metrics,
            flags.economic_buyer,
            flags.decision_criteria,
            flags.decision_process,
            flags.paper_process,
            flags.identify_pain,
            flags.champion,
            flags.competition,
        ];

        let mut checklist = Meddpicc::default();
        for (criterion, value) in Criterion::ALL.into_iter().zip(addressed) {
            checklist.get_mut(criterion).addressed = value;
        }
        checklist
    }
}

/// Review state for one deal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewState {
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default)]
    pub checklist: Meddpicc,
}

/// Keyed store of per-deal review state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewOverlay {
    states: BTreeMap<String, ReviewState>,
}

impl ReviewOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an overlay saved by [`ReviewOverlay::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read review state: {}", path.display()))?;
        let overlay: ReviewOverlay = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse review state: {}", path.display()))?;
        debug!("Loaded review state for {} deals", overlay.states.len());
        Ok(overlay)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write review state: {}", path.display()))
    }

    /// Current state for a deal, if any has been recorded.
    pub fn state(&self, deal_id: &str) -> Option<&ReviewState> {
        self.states.get(deal_id)
    }

    /// State for a deal, seeded from the deal's own flags on first touch.
    fn entry(&mut self, deal: &Deal) -> &mut ReviewState {
        self.states
            .entry(deal.id.clone())
            .or_insert_with(|| ReviewState {
                reviewed: deal.reviewed,
                notes: deal.notes.clone().unwrap_or_default(),
                checklist: deal.meddpicc.map(Meddpicc::from).unwrap_or_default(),
            })
    }

    pub fn mark_reviewed(&mut self, deal: &Deal, reviewed: bool) {
        self.entry(deal).reviewed = reviewed;
    }

    pub fn set_notes(&mut self, deal: &Deal, notes: &str) {
        self.entry(deal).notes = notes.to_string();
    }

    pub fn set_criterion(&mut self, deal: &Deal, criterion: Criterion, addressed: bool) {
        self.entry(deal).checklist.get_mut(criterion).addressed = addressed;
    }

    pub fn set_criterion_notes(&mut self, deal: &Deal, criterion: Criterion, notes: &str) {
        self.entry(deal).checklist.get_mut(criterion).notes = notes.to_string();
    }

    /// Reviewed flag with the overlay taking precedence over the dataset.
    pub fn is_reviewed(&self, deal: &Deal) -> bool {
        self.state(&deal.id).map_or(deal.reviewed, |s| s.reviewed)
    }

    /// Checklist for a deal: overlay state, else the dataset flags, else empty.
    pub fn checklist(&self, deal: &Deal) -> Meddpicc {
        match self.state(&deal.id) {
            Some(state) => state.checklist.clone(),
            None => deal.meddpicc.map(Meddpicc::from).unwrap_or_default(),
        }
    }

    pub fn reviewed_count(&self, deals: &[Deal]) -> usize {
        deals.iter().filter(|d| self.is_reviewed(d)).count()
    }

    /// Copies of `deals` with reviewed flags taken from the overlay.
    pub fn apply(&self, deals: &[Deal]) -> Vec<Deal> {
        deals
            .iter()
            .map(|deal| Deal {
                reviewed: self.is_reviewed(deal),
                ..deal.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::tests::create_test_deal;
    use crate::models::Stage;
    use tempfile::TempDir;

    #[test]
    fn test_qualification_score() {
        let mut checklist = Meddpicc::default();
        assert_eq!(checklist.qualification_score(), 0);

        checklist.get_mut(Criterion::Champion).addressed = true;
        checklist.get_mut(Criterion::Metrics).addressed = true;
        checklist.get_mut(Criterion::PaperProcess).addressed = true;
        assert_eq!(checklist.addressed_count(), 3);
        assert_eq!(checklist.qualification_score(), 38);

        let labels: Vec<String> = checklist.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(labels.len(), 8);
        assert_eq!(labels[1], "Economic Buyer");
    }

    #[test]
    fn test_checklist_from_flags() {
        let flags = MeddpiccFlags {
            identify_pain: true,
            competition: true,
            ..MeddpiccFlags::default()
        };
        let checklist = Meddpicc::from(flags);
        assert!(checklist.get(Criterion::IdentifiedPain).addressed);
        assert!(checklist.get(Criterion::Competition).addressed);
        assert!(!checklist.get(Criterion::Champion).addressed);
    }

    #[test]
    fn test_overlay_does_not_mutate_deals() {
        let deals = vec![
            create_test_deal("deal-001", Stage::Commit, 10.0),
            create_test_deal("deal-002", Stage::Sourcing, 20.0),
        ];
        let mut overlay = ReviewOverlay::new();

        overlay.mark_reviewed(&deals[0], true);
        overlay.set_notes(&deals[0], "Champion confirmed on call");
        overlay.set_criterion(&deals[0], Criterion::Champion, true);

        assert!(!deals[0].reviewed);
        assert!(overlay.is_reviewed(&deals[0]));
        assert!(!overlay.is_reviewed(&deals[1]));
        assert_eq!(overlay.reviewed_count(&deals), 1);
        assert_eq!(overlay.checklist(&deals[0]).qualification_score(), 13);

        let applied = overlay.apply(&deals);
        assert!(applied[0].reviewed);
        assert!(!applied[1].reviewed);
        assert_eq!(
            overlay.state("deal-001").map(|s| s.notes.as_str()),
            Some("Champion confirmed on call")
        );
    }

    #[test]
    fn test_overlay_seeds_from_dataset() {
        let mut deal = create_test_deal("deal-001", Stage::Commit, 10.0);
        deal.reviewed = true;
        deal.meddpicc = Some(MeddpiccFlags {
            metrics: true,
            ..MeddpiccFlags::default()
        });

        let mut overlay = ReviewOverlay::new();
        assert!(overlay.is_reviewed(&deal));

        overlay.set_criterion_notes(&deal, Criterion::Metrics, "30% faster batch release");
        let state = overlay.state("deal-001").unwrap();
        assert!(state.reviewed);
        assert!(state.checklist.get(Criterion::Metrics).addressed);
        assert_eq!(
            state.checklist.get(Criterion::Metrics).notes,
            "30% faster batch release"
        );
    }

    #[test]
    fn test_overlay_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("review.json");
        let deal = create_test_deal("deal-007", Stage::Solution, 10.0);

        let mut overlay = ReviewOverlay::new();
        overlay.mark_reviewed(&deal, true);
        overlay.save(&path).unwrap();

        let loaded = ReviewOverlay::load(&path).unwrap();
        assert_eq!(loaded, overlay);
        assert!(loaded.is_reviewed(&deal));
    }
}
