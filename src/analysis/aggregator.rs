//! Deal aggregation and statistics.
//!
//! This module provides the grouping primitive every rollup is built on,
//! plus the region, owner, account, stage, and pipeline summaries.

use crate::models::{
    percent, AccountMetrics, Deal, Metrics, PipelineSummary, Region, Stage, StageMetrics,
};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sort direction for [`rank_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort keys offered for deal listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DealSort {
    /// Review queue order: stage descending, then amount descending.
    #[default]
    Stage,
    Amount,
    Egp,
    CloseDate,
}

/// Find a deal by id. The first match wins if ids repeat.
pub fn lookup_by_id<'a>(deals: &'a [Deal], id: &str) -> Option<&'a Deal> {
    deals.iter().find(|d| d.id == id)
}

/// Group deals by a key, keeping dataset order within each group.
pub fn group_by<'a, I, K, F>(deals: I, key_fn: F) -> BTreeMap<K, Vec<&'a Deal>>
where
    I: IntoIterator<Item = &'a Deal>,
    K: Ord,
    F: Fn(&Deal) -> K,
{
    let mut grouped: BTreeMap<K, Vec<&'a Deal>> = BTreeMap::new();

    for deal in deals {
        grouped.entry(key_fn(deal)).or_default().push(deal);
    }

    grouped
}

/// All deals in a region, in dataset order.
pub fn filter_by_region(deals: &[Deal], region: Region) -> Vec<&Deal> {
    deals.iter().filter(|d| d.region == region).collect()
}

/// Compute the rollup for any group of deals.
pub fn compute_metrics<'a, I>(deals: I) -> Metrics
where
    I: IntoIterator<Item = &'a Deal>,
{
    let mut metrics = Metrics::default();
    let mut days_open_total: u64 = 0;

    for deal in deals {
        metrics.deal_count += 1;
        metrics.total_amount += deal.amount;
        metrics.total_egp += deal.egp;
        days_open_total += u64::from(deal.days_open);
        metrics.by_stage.increment(deal.stage);
        metrics.by_region.increment(deal.region);

        if deal.reviewed {
            metrics.reviewed_count += 1;
        } else {
            metrics.pending_count += 1;
        }

        if deal.stage == Stage::Commit {
            metrics.stage4_pipeline += deal.amount;
        }
    }

    if metrics.deal_count > 0 {
        let count = metrics.deal_count as f64;
        metrics.avg_deal_size = metrics.total_amount / count;
        metrics.avg_days_open = days_open_total as f64 / count;
    }
    metrics.margin_percent = percent(metrics.total_egp, metrics.total_amount);

    metrics
}

/// Rollup for one region. An empty region yields zeroed metrics.
pub fn compute_region_metrics(deals: &[Deal], region: Region) -> Metrics {
    compute_metrics(filter_by_region(deals, region))
}

/// Rollup per owner, keyed by owner name.
pub fn compute_owner_metrics(deals: &[Deal]) -> BTreeMap<String, Metrics> {
    group_by(deals, |d| d.owner.clone())
        .into_iter()
        .map(|(owner, group)| (owner, compute_metrics(group)))
        .collect()
}

/// Rollup per customer account, keyed by account name.
pub fn compute_account_metrics<'a, I>(deals: I) -> BTreeMap<String, AccountMetrics>
where
    I: IntoIterator<Item = &'a Deal>,
{
    group_by(deals, |d| d.account_name.clone())
        .into_iter()
        .map(|(account_name, group)| {
            let mut metrics = AccountMetrics {
                account_name: account_name.clone(),
                ..AccountMetrics::default()
            };
            for deal in group {
                metrics.deal_count += 1;
                metrics.total_amount += deal.amount;
                metrics.total_egp += deal.egp;
                metrics.stage_histogram.increment(deal.stage);
                metrics.deal_ids.push(deal.id.clone());
            }
            (account_name, metrics)
        })
        .collect()
}

/// Stable sort by a key. Incomparable keys (NaN amounts) are treated as equal.
pub fn rank_by<T, K, F>(mut items: Vec<T>, key_fn: F, direction: SortDirection) -> Vec<T>
where
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    items.sort_by(|a, b| {
        let ordering = key_fn(a)
            .partial_cmp(&key_fn(b))
            .unwrap_or(Ordering::Equal);
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    items
}

/// Review queue comparator: stage descending, then amount descending.
pub fn queue_order(a: &Deal, b: &Deal) -> Ordering {
    b.stage.cmp(&a.stage).then_with(|| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(Ordering::Equal)
    })
}

/// Deals in review queue order.
pub fn sorted_deals<'a, I>(deals: I) -> Vec<&'a Deal>
where
    I: IntoIterator<Item = &'a Deal>,
{
    sort_deals(deals.into_iter().collect(), DealSort::Stage)
}

/// Sort a deal listing by the chosen key.
pub fn sort_deals(deals: Vec<&Deal>, sort: DealSort) -> Vec<&Deal> {
    match sort {
        DealSort::Stage => rank_by(deals, |d| (d.stage, d.amount), SortDirection::Descending),
        DealSort::Amount => rank_by(deals, |d| d.amount, SortDirection::Descending),
        DealSort::Egp => rank_by(deals, |d| d.egp, SortDirection::Descending),
        DealSort::CloseDate => rank_by(deals, |d| d.close_date, SortDirection::Ascending),
    }
}

/// Totals over the whole collection.
pub fn compute_pipeline_summary(deals: &[Deal]) -> PipelineSummary {
    let metrics = compute_metrics(deals);
    let commits: Vec<&Deal> = commit_deals(deals);

    PipelineSummary {
        deal_count: metrics.deal_count,
        total_amount: metrics.total_amount,
        total_egp: metrics.total_egp,
        margin_percent: metrics.margin_percent,
        avg_deal_size: metrics.avg_deal_size,
        by_stage: metrics.by_stage,
        by_region: metrics.by_region,
        reviewed_count: metrics.reviewed_count,
        pending_count: metrics.pending_count,
        commit_count: commits.len(),
        commit_amount: commits.iter().map(|d| d.amount).sum(),
    }
}

/// Per-stage velocity, highest stage first. Stages with no deals are kept.
pub fn compute_stage_metrics<'a, I>(deals: I) -> Vec<StageMetrics>
where
    I: IntoIterator<Item = &'a Deal>,
{
    let grouped = group_by(deals, |d| d.stage);

    Stage::DESCENDING
        .iter()
        .map(|stage| {
            let metrics = grouped
                .get(stage)
                .map(|group| compute_metrics(group.iter().copied()))
                .unwrap_or_default();
            StageMetrics {
                stage: *stage,
                deal_count: metrics.deal_count,
                total_amount: metrics.total_amount,
                total_egp: metrics.total_egp,
                avg_days_open: metrics.avg_days_open,
            }
        })
        .collect()
}

/// URL-style slug for an owner name: lowercase, whitespace runs become `-`.
pub fn owner_slug(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolve an owner from a slug or exact name.
pub fn owner_from_slug(deals: &[Deal], slug: &str) -> Option<String> {
    let wanted = owner_slug(slug);
    deals
        .iter()
        .map(|d| &d.owner)
        .find(|owner| owner.as_str() == slug || owner_slug(owner) == wanted)
        .cloned()
}

/// Deals owned by `owner`, in dataset order.
pub fn deals_for_owner<'a>(deals: &'a [Deal], owner: &str) -> Vec<&'a Deal> {
    deals.iter().filter(|d| d.owner == owner).collect()
}

/// Owners ranked by total pipeline.
pub fn top_owners(deals: &[Deal], n: usize) -> Vec<(String, Metrics)> {
    let mut ranked = rank_by(
        compute_owner_metrics(deals).into_iter().collect(),
        |(_, m): &(String, Metrics)| m.total_amount,
        SortDirection::Descending,
    );
    ranked.truncate(n);
    ranked
}

/// Accounts ranked by total pipeline.
pub fn top_accounts<'a, I>(deals: I, n: usize) -> Vec<AccountMetrics>
where
    I: IntoIterator<Item = &'a Deal>,
{
    let mut ranked = rank_by(
        compute_account_metrics(deals).into_values().collect(),
        |a: &AccountMetrics| a.total_amount,
        SortDirection::Descending,
    );
    ranked.truncate(n);
    ranked
}

/// Deals closing within `[from, to]`, earliest first.
pub fn deals_closing_between(deals: &[Deal], from: NaiveDate, to: NaiveDate) -> Vec<&Deal> {
    let window = deals
        .iter()
        .filter(|d| d.close_date >= from && d.close_date <= to)
        .collect();
    sort_deals(window, DealSort::CloseDate)
}

/// Deals closing within `within_days` of `today`, including past-due ones.
pub fn urgent_deals(deals: &[Deal], today: NaiveDate, within_days: i64) -> Vec<&Deal> {
    deals
        .iter()
        .filter(|d| (d.close_date - today).num_days() <= within_days)
        .collect()
}

/// Deals forecast as Commit.
pub fn commit_deals(deals: &[Deal]) -> Vec<&Deal> {
    deals.iter().filter(|d| d.is_commit_forecast()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn create_test_deal(id: &str, stage: Stage, amount: f64) -> Deal {
        Deal {
            id: id.to_string(),
            opportunity_id: None,
            opportunity_name: format!("{} opportunity", id),
            account_name: "Acme Bio".to_string(),
            amount,
            egp: amount * 0.4,
            close_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            stage,
            stage_name: None,
            owner: "Jim Macdonell".to_string(),
            region: Region::East,
            forecast_category: "Pipeline".to_string(),
            days_open: 45,
            days_in_stage: 20,
            reviewed: false,
            meddpicc: None,
            notes: None,
        }
    }

    fn sample_deals() -> Vec<Deal> {
        let mut west = create_test_deal("deal-001", Stage::Solution, 200_000.0);
        west.region = Region::West;
        west.owner = "Mike Campbell".to_string();
        west.account_name = "Halozyme, Inc.".to_string();
        west.days_open = 335;

        let mut europe = create_test_deal("deal-002", Stage::Commit, 80_000.0);
        europe.region = Region::Europe;
        europe.owner = "Marcus Dinan".to_string();
        europe.reviewed = true;
        europe.forecast_category = "Commit".to_string();

        let east = create_test_deal("deal-003", Stage::Sourcing, 50_000.0);

        let mut east_commit = create_test_deal("deal-004", Stage::Commit, 120_000.0);
        east_commit.days_open = 10;

        vec![west, europe, east, east_commit]
    }

    #[test]
    fn test_lookup_by_id() {
        let deals = sample_deals();
        assert_eq!(lookup_by_id(&deals, "deal-003").map(|d| d.amount), Some(50_000.0));
        assert!(lookup_by_id(&deals, "deal-999").is_none());
        assert!(lookup_by_id(&[], "deal-001").is_none());
    }

    #[test]
    fn test_lookup_by_id_duplicates_first_wins() {
        let first = create_test_deal("deal-001", Stage::Sourcing, 1.0);
        let second = create_test_deal("deal-001", Stage::Commit, 2.0);
        let deals = vec![first, second];

        assert_eq!(lookup_by_id(&deals, "deal-001").map(|d| d.amount), Some(1.0));
    }

    #[test]
    fn test_filter_by_region_matches_metrics() {
        let deals = sample_deals();

        for region in Region::ALL {
            let filtered = filter_by_region(&deals, region);
            assert!(filtered.iter().all(|d| d.region == region));
            assert_eq!(
                filtered.len(),
                compute_region_metrics(&deals, region).deal_count
            );
        }

        let east: Vec<&str> = filter_by_region(&deals, Region::East)
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(east, vec!["deal-003", "deal-004"]);
    }

    #[test]
    fn test_region_metrics_empty() {
        let metrics = compute_region_metrics(&[], Region::West);
        assert_eq!(metrics.deal_count, 0);
        assert_eq!(metrics.total_amount, 0.0);
        assert_eq!(metrics.total_egp, 0.0);
        assert_eq!(metrics.avg_deal_size, 0.0);
        assert_eq!(metrics.avg_days_open, 0.0);
        assert_eq!(metrics.margin_percent, 0.0);
        assert!(!metrics.avg_deal_size.is_nan());
    }

    #[test]
    fn test_region_metrics() {
        let deals = sample_deals();
        let east = compute_region_metrics(&deals, Region::East);

        assert_eq!(east.deal_count, 2);
        assert_eq!(east.total_amount, 170_000.0);
        assert_eq!(east.avg_deal_size, 85_000.0);
        assert_eq!(east.avg_days_open, 27.5);
        assert_eq!(east.by_stage.stage4, 1);
        assert_eq!(east.by_stage.stage1, 1);
        assert_eq!(east.pending_count, 2);
        assert_eq!(east.stage4_pipeline, 120_000.0);
    }

    #[test]
    fn test_owner_metrics() {
        let deals = sample_deals();
        let owners = compute_owner_metrics(&deals);

        assert_eq!(owners.len(), 3);
        let jim = &owners["Jim Macdonell"];
        assert_eq!(jim.deal_count, 2);
        assert_eq!(jim.stage4_pipeline, 120_000.0);
        assert!((jim.margin_percent - 40.0).abs() < 1e-9);

        let marcus = &owners["Marcus Dinan"];
        assert_eq!(marcus.reviewed_count, 1);
        assert_eq!(marcus.by_region.europe, 1);
    }

    #[test]
    fn test_owner_margin_zero_amount() {
        let mut deal = create_test_deal("deal-001", Stage::Sourcing, 0.0);
        deal.egp = 0.0;
        let owners = compute_owner_metrics(&[deal]);

        let metrics = &owners["Jim Macdonell"];
        assert_eq!(metrics.margin_percent, 0.0);
        assert!(!metrics.margin_percent.is_nan());
    }

    #[test]
    fn test_account_metrics() {
        let deals = sample_deals();
        let accounts = compute_account_metrics(&deals);

        let acme = &accounts["Acme Bio"];
        assert_eq!(acme.deal_count, 3);
        assert_eq!(acme.total_amount, 250_000.0);
        assert_eq!(acme.stage_histogram.stage4, 2);
        assert_eq!(acme.deal_ids, vec!["deal-002", "deal-003", "deal-004"]);

        assert_eq!(accounts["Halozyme, Inc."].deal_count, 1);
    }

    #[test]
    fn test_sorted_deals_queue_order() {
        let a = create_test_deal("A", Stage::Commit, 100.0);
        let b = create_test_deal("B", Stage::Commit, 50.0);
        let c = create_test_deal("C", Stage::Qualifying, 1000.0);
        let deals = vec![c, b, a];

        let ids: Vec<&str> = sorted_deals(&deals).iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_sorted_deals_adjacent_pairs() {
        let deals = sample_deals();
        let sorted = sorted_deals(&deals);

        for pair in sorted.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.stage > b.stage || (a.stage == b.stage && a.amount >= b.amount));
            assert_ne!(queue_order(a, b), Ordering::Greater);
        }
    }

    #[test]
    fn test_rank_by_is_stable() {
        let items = vec![("x", 1), ("y", 2), ("z", 1)];
        let ranked = rank_by(items, |(_, n)| *n, SortDirection::Ascending);
        assert_eq!(ranked, vec![("x", 1), ("z", 1), ("y", 2)]);
    }

    #[test]
    fn test_sort_deals_by_close_date() {
        let mut early = create_test_deal("early", Stage::Sourcing, 1.0);
        early.close_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let late = create_test_deal("late", Stage::Commit, 1.0);
        let deals = vec![late, early];

        let sorted = sort_deals(deals.iter().collect(), DealSort::CloseDate);
        assert_eq!(sorted[0].id, "early");
    }

    #[test]
    fn test_pipeline_summary_totals() {
        let deals = sample_deals();
        let summary = compute_pipeline_summary(&deals);

        let amount: f64 = deals.iter().map(|d| d.amount).sum();
        let egp: f64 = deals.iter().map(|d| d.egp).sum();
        assert_eq!(summary.total_amount, amount);
        assert_eq!(summary.total_egp, egp);
        assert_eq!(summary.deal_count, 4);
        assert_eq!(summary.by_region.east, 2);
        assert_eq!(summary.by_stage.stage4, 2);
        assert_eq!(summary.reviewed_count, 1);
        assert_eq!(summary.pending_count, 3);
        assert_eq!(summary.commit_count, 1);
        assert_eq!(summary.commit_amount, 80_000.0);
    }

    #[test]
    fn test_stage_metrics_keeps_empty_stages() {
        let deals = vec![create_test_deal("deal-001", Stage::Qualifying, 10.0)];
        let stages = compute_stage_metrics(&deals);

        assert_eq!(stages.len(), 4);
        assert_eq!(stages[0].stage, Stage::Commit);
        assert_eq!(stages[0].deal_count, 0);
        assert_eq!(stages[0].avg_days_open, 0.0);
        assert_eq!(stages[2].deal_count, 1);
    }

    #[test]
    fn test_owner_slug_lookup() {
        let deals = sample_deals();
        assert_eq!(owner_slug("Lisa  Burgese Fry"), "lisa-burgese-fry");
        assert_eq!(
            owner_from_slug(&deals, "mike-campbell").as_deref(),
            Some("Mike Campbell")
        );
        assert_eq!(
            owner_from_slug(&deals, "Marcus Dinan").as_deref(),
            Some("Marcus Dinan")
        );
        assert!(owner_from_slug(&deals, "nobody").is_none());
    }

    #[test]
    fn test_top_accounts_and_owners() {
        let deals = sample_deals();

        let accounts = top_accounts(&deals, 1);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_name, "Acme Bio");

        let owners = top_owners(&deals, 2);
        assert_eq!(owners[0].0, "Mike Campbell");
        assert_eq!(owners[1].0, "Jim Macdonell");
    }

    #[test]
    fn test_top_accounts_over_borrowed_subset() {
        let deals = sample_deals();
        let owned = deals_for_owner(&deals, "Jim Macdonell");

        let accounts = top_accounts(owned.iter().copied(), 5);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account_name, "Acme Bio");
        assert_eq!(accounts[0].deal_count, 2);
        assert_eq!(accounts[0].total_amount, 170_000.0);
        assert_eq!(accounts[0].deal_ids, vec!["deal-003", "deal-004"]);

        let stages = compute_stage_metrics(owned.iter().copied());
        assert_eq!(stages.iter().map(|s| s.deal_count).sum::<usize>(), 2);
    }

    #[test]
    fn test_close_windows() {
        let mut deals = sample_deals();
        deals[0].close_date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        deals[1].close_date = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();

        let feb = deals_closing_between(
            &deals,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
        );
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].id, "deal-001");

        let today = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let urgent: Vec<&str> = urgent_deals(&deals, today, 7)
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(urgent, vec!["deal-001", "deal-002"]);
    }
}
