//! Report view assembly.
//!
//! Each view gathers the aggregator output one report needs into a
//! serializable structure. Rendering lives in `generator`.

use crate::analysis::{
    action_owners, action_stats, actions_for_deal, aging_deals, at_risk_deals,
    compute_account_metrics, compute_aging_buckets, compute_metrics, compute_owner_metrics,
    compute_pipeline_summary, compute_region_metrics, compute_stage_metrics,
    compute_transition_report, dangling_action_refs, deals_closing_between, deals_for_owner,
    effective_status, filter_actions, filter_by_region, lookup_by_id, owner_from_slug, owner_slug,
    rank_by, score_churn_risk, sort_deals, sorted_deals, stale_deals, top_accounts, top_owners,
    urgent_deals, ActionStats, ChurnRisk, DealSort, SortDirection, TransitionPolicy,
    TransitionReport,
};
use crate::config::Config;
use crate::error::PipelineError;
use crate::models::{
    AccountMetrics, ActionItem, ActionStatus, AgingBucket, Deal, Metrics, PipelineSummary,
    Region, Stage, StageMetrics,
};
use crate::review::ReviewOverlay;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inputs shared by every view.
pub struct ReportContext<'a> {
    /// Deals with review overlay already applied.
    pub deals: &'a [Deal],
    pub actions: &'a [ActionItem],
    pub overlay: &'a ReviewOverlay,
    pub config: &'a Config,
    /// Reference date for overdue, urgency, and quarter windows.
    pub today: NaiveDate,
    /// Order of owner and region deal listings.
    pub sort: DealSort,
}

/// Which report to build.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewRequest {
    Summary,
    Owners,
    /// Owner name or slug.
    Owner(String),
    Accounts,
    Region(Region),
    Velocity,
    Actions {
        status: Option<ActionStatus>,
        owner: Option<String>,
    },
    /// Deal id.
    Deal(String),
    /// Owner name or slug.
    Transition(String),
    Risk,
}

/// Metadata about the generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub title: String,
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub as_of: NaiveDate,
    pub deal_count: usize,
    pub action_count: usize,
}

/// A complete report: metadata plus one view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub view: ReportView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReportView {
    Summary(DashboardView),
    Owners(OwnersView),
    Owner(OwnerView),
    Accounts(AccountsView),
    Region(RegionView),
    Velocity(VelocityView),
    Actions(ActionsView),
    Deal(Box<DealView>),
    Transition(TransitionView),
    Risk(RiskView),
}

impl ReportView {
    pub fn title(&self) -> String {
        match self {
            ReportView::Summary(_) => "Pipeline Review".to_string(),
            ReportView::Owners(_) => "Pipeline by Owner".to_string(),
            ReportView::Owner(v) => format!("Owner: {}", v.owner),
            ReportView::Accounts(_) => "Pipeline by Account".to_string(),
            ReportView::Region(v) => format!("{} Region", v.region),
            ReportView::Velocity(_) => "Pipeline Velocity".to_string(),
            ReportView::Actions(_) => "Action Items".to_string(),
            ReportView::Deal(v) => format!("Deal: {}", v.deal.opportunity_name),
            ReportView::Transition(v) => format!("Transition: {}", v.report.owner),
            ReportView::Risk(_) => "Churn Risk".to_string(),
        }
    }
}

/// One deal as listed in report tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealRow {
    pub id: String,
    pub opportunity_name: String,
    pub account_name: String,
    pub owner: String,
    pub region: Region,
    pub stage: Stage,
    pub forecast_category: String,
    pub amount: f64,
    pub egp: f64,
    pub close_date: NaiveDate,
    pub days_open: u32,
    pub days_in_stage: u32,
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_flags: Vec<String>,
}

impl DealRow {
    fn new(deal: &Deal, with_risk: bool) -> Self {
        Self {
            id: deal.id.clone(),
            opportunity_name: deal.opportunity_name.clone(),
            account_name: deal.account_name.clone(),
            owner: deal.owner.clone(),
            region: deal.region,
            stage: deal.stage,
            forecast_category: deal.forecast_category.clone(),
            amount: deal.amount,
            egp: deal.egp,
            close_date: deal.close_date,
            days_open: deal.days_open,
            days_in_stage: deal.days_in_stage,
            reviewed: deal.reviewed,
            risk_flags: if with_risk {
                score_churn_risk(deal).flags
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRow {
    pub region: Region,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub summary: PipelineSummary,
    pub regions: Vec<RegionRow>,
    pub top_owners: Vec<OwnerRow>,
    pub review_queue: Vec<DealRow>,
    pub urgent: Vec<DealRow>,
    pub stale_count: usize,
    pub stale_amount: f64,
    pub at_risk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRow {
    pub owner: String,
    pub slug: String,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnersView {
    pub owners: Vec<OwnerRow>,
    pub total_stage4_pipeline: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    pub owner: String,
    pub slug: String,
    pub metrics: Metrics,
    pub stages: Vec<StageMetrics>,
    pub top_accounts: Vec<AccountMetrics>,
    pub aging_days: u32,
    pub aging_count: usize,
    pub aging_amount: f64,
    pub deals: Vec<DealRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsView {
    pub accounts: Vec<AccountMetrics>,
    pub multi_deal_accounts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionView {
    pub region: Region,
    pub metrics: Metrics,
    pub deals: Vec<DealRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityView {
    pub avg_days_open: f64,
    pub stages: Vec<StageMetrics>,
    pub aging: Vec<AgingBucket>,
    pub stale_days: u32,
    pub stale: Vec<DealRow>,
    pub stale_amount: f64,
    pub quarter_start: NaiveDate,
    pub quarter_end: NaiveDate,
    pub closing_this_quarter: Vec<DealRow>,
    pub quarter_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRow {
    pub id: String,
    pub deal_id: String,
    pub deal_name: String,
    pub action: String,
    pub owner: String,
    pub due_date: NaiveDate,
    /// Status after overdue derivation.
    pub status: ActionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsView {
    pub stats: ActionStats,
    pub items: Vec<ActionRow>,
    pub owners: Vec<String>,
    /// Action ids whose deal is missing from the dataset.
    pub dangling: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistRow {
    pub criterion: String,
    pub question: String,
    pub addressed: bool,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealView {
    pub deal: DealRow,
    pub stage_name: Option<String>,
    pub margin_percent: f64,
    pub risk: ChurnRisk,
    pub checklist: Vec<ChecklistRow>,
    pub qualification_score: u32,
    pub notes: String,
    pub actions: Vec<ActionRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionView {
    pub report: TransitionReport,
    /// Risk flags for each priority deal, same order.
    pub priority_rows: Vec<DealRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRow {
    pub deal: DealRow,
    pub risk: ChurnRisk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskView {
    pub min_score: u32,
    pub deals: Vec<RiskRow>,
    pub total_amount: f64,
}

impl<'a> ReportContext<'a> {
    fn row(&self, deal: &Deal) -> DealRow {
        DealRow::new(deal, self.config.report.include_risk_flags)
    }

    fn rows<'d>(&self, deals: impl IntoIterator<Item = &'d Deal>) -> Vec<DealRow> {
        deals.into_iter().map(|d| self.row(d)).collect()
    }

    fn action_row(&self, action: &ActionItem) -> ActionRow {
        let deal_name = if action.deal_name.is_empty() {
            lookup_by_id(self.deals, &action.deal_id)
                .map(|d| d.opportunity_name.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        } else {
            action.deal_name.clone()
        };

        ActionRow {
            id: action.id.clone(),
            deal_id: action.deal_id.clone(),
            deal_name,
            action: action.action.clone(),
            owner: action.owner.clone(),
            due_date: action.due_date,
            status: effective_status(action, self.today),
        }
    }

    fn resolve_owner(&self, name_or_slug: &str) -> Result<String, PipelineError> {
        owner_from_slug(self.deals, name_or_slug)
            .ok_or_else(|| PipelineError::not_found("owner", name_or_slug))
    }
}

/// Build a report for the requested view.
pub fn build_report(
    ctx: &ReportContext<'_>,
    request: &ViewRequest,
    source: &str,
) -> Result<Report, PipelineError> {
    let view = build_view(ctx, request)?;

    Ok(Report {
        metadata: ReportMetadata {
            title: view.title(),
            source: source.to_string(),
            generated_at: Utc::now(),
            as_of: ctx.today,
            deal_count: ctx.deals.len(),
            action_count: ctx.actions.len(),
        },
        view,
    })
}

/// Assemble the data for one view. Unknown owners and deals are `NotFound`.
pub fn build_view(
    ctx: &ReportContext<'_>,
    request: &ViewRequest,
) -> Result<ReportView, PipelineError> {
    debug!("Building view: {:?}", request);

    let view = match request {
        ViewRequest::Summary => ReportView::Summary(dashboard_view(ctx)),
        ViewRequest::Owners => ReportView::Owners(owners_view(ctx)),
        ViewRequest::Owner(name) => ReportView::Owner(owner_view(ctx, name)?),
        ViewRequest::Accounts => ReportView::Accounts(accounts_view(ctx)),
        ViewRequest::Region(region) => ReportView::Region(region_view(ctx, *region)),
        ViewRequest::Velocity => ReportView::Velocity(velocity_view(ctx)),
        ViewRequest::Actions { status, owner } => {
            ReportView::Actions(actions_view(ctx, *status, owner.as_deref()))
        }
        ViewRequest::Deal(id) => ReportView::Deal(Box::new(deal_view(ctx, id)?)),
        ViewRequest::Transition(name) => ReportView::Transition(transition_view(ctx, name)?),
        ViewRequest::Risk => ReportView::Risk(risk_view(ctx)),
    };

    Ok(view)
}

fn dashboard_view(ctx: &ReportContext<'_>) -> DashboardView {
    let stale = stale_deals(ctx.deals, ctx.config.aging.stale_days);
    let mut queue = sorted_deals(ctx.deals);
    queue.retain(|d| !d.reviewed);
    queue.truncate(ctx.config.report.top_n);

    DashboardView {
        summary: compute_pipeline_summary(ctx.deals),
        regions: Region::ALL
            .iter()
            .map(|region| RegionRow {
                region: *region,
                metrics: compute_region_metrics(ctx.deals, *region),
            })
            .collect(),
        top_owners: top_owners(ctx.deals, ctx.config.report.top_n)
            .into_iter()
            .map(|(owner, metrics)| OwnerRow {
                slug: owner_slug(&owner),
                owner,
                metrics,
            })
            .collect(),
        review_queue: ctx.rows(queue),
        urgent: ctx.rows(sort_deals(
            urgent_deals(ctx.deals, ctx.today, ctx.config.risk.urgent_within_days),
            DealSort::CloseDate,
        )),
        stale_count: stale.len(),
        stale_amount: stale.iter().map(|d| d.amount).sum(),
        at_risk_count: at_risk_deals(ctx.deals, ctx.config.risk.at_risk_score).len(),
    }
}

fn owners_view(ctx: &ReportContext<'_>) -> OwnersView {
    let owners: Vec<OwnerRow> = compute_owner_metrics(ctx.deals)
        .into_iter()
        .map(|(owner, metrics)| OwnerRow {
            slug: owner_slug(&owner),
            owner,
            metrics,
        })
        .collect();
    let owners = rank_by(owners, |o| o.metrics.total_amount, SortDirection::Descending);

    OwnersView {
        total_stage4_pipeline: owners.iter().map(|o| o.metrics.stage4_pipeline).sum(),
        owners,
    }
}

fn owner_view(ctx: &ReportContext<'_>, name_or_slug: &str) -> Result<OwnerView, PipelineError> {
    let owner = ctx.resolve_owner(name_or_slug)?;
    let owned = deals_for_owner(ctx.deals, &owner);
    let aging_days = ctx.config.aging.attention_days;
    let aging = aging_deals(owned.iter().copied(), aging_days);

    Ok(OwnerView {
        slug: owner_slug(&owner),
        metrics: compute_metrics(owned.iter().copied()),
        stages: compute_stage_metrics(owned.iter().copied())
            .into_iter()
            .filter(|s| s.deal_count > 0)
            .collect(),
        top_accounts: top_accounts(owned.iter().copied(), ctx.config.report.top_n),
        aging_days,
        aging_count: aging.len(),
        aging_amount: aging.iter().map(|d| d.amount).sum(),
        deals: ctx.rows(sort_deals(owned, ctx.sort)),
        owner,
    })
}

fn accounts_view(ctx: &ReportContext<'_>) -> AccountsView {
    let accounts = rank_by(
        compute_account_metrics(ctx.deals).into_values().collect(),
        |a: &AccountMetrics| a.total_amount,
        SortDirection::Descending,
    );

    AccountsView {
        multi_deal_accounts: accounts.iter().filter(|a| a.deal_count > 1).count(),
        accounts,
    }
}

fn region_view(ctx: &ReportContext<'_>, region: Region) -> RegionView {
    RegionView {
        region,
        metrics: compute_region_metrics(ctx.deals, region),
        deals: ctx.rows(sort_deals(filter_by_region(ctx.deals, region), ctx.sort)),
    }
}

/// First and last day of the calendar quarter containing `date`.
pub fn quarter_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_month = (date.month0() / 3) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date);
    let end = if first_month == 10 {
        NaiveDate::from_ymd_opt(date.year(), 12, 31)
    } else {
        NaiveDate::from_ymd_opt(date.year(), first_month + 3, 1).and_then(|d| d.pred_opt())
    }
    .unwrap_or(date);
    (start, end)
}

fn velocity_view(ctx: &ReportContext<'_>) -> VelocityView {
    let stale_days = ctx.config.aging.stale_days;
    let stale = stale_deals(ctx.deals, stale_days);
    let (quarter_start, quarter_end) = quarter_bounds(ctx.today);
    let quarter = deals_closing_between(ctx.deals, quarter_start, quarter_end);

    VelocityView {
        avg_days_open: compute_metrics(ctx.deals).avg_days_open,
        stages: compute_stage_metrics(ctx.deals),
        aging: compute_aging_buckets(ctx.deals, &ctx.config.aging.buckets),
        stale_days,
        stale_amount: stale.iter().map(|d| d.amount).sum(),
        stale: ctx.rows(stale),
        quarter_start,
        quarter_end,
        quarter_amount: quarter.iter().map(|d| d.amount).sum(),
        closing_this_quarter: ctx.rows(quarter),
    }
}

fn actions_view(
    ctx: &ReportContext<'_>,
    status: Option<ActionStatus>,
    owner: Option<&str>,
) -> ActionsView {
    ActionsView {
        stats: action_stats(ctx.actions, ctx.today),
        items: filter_actions(ctx.actions, status, owner, ctx.today)
            .into_iter()
            .map(|a| ctx.action_row(a))
            .collect(),
        owners: action_owners(ctx.actions)
            .into_iter()
            .map(String::from)
            .collect(),
        dangling: dangling_action_refs(ctx.actions, ctx.deals)
            .into_iter()
            .map(|a| a.id.clone())
            .collect(),
    }
}

fn deal_view(ctx: &ReportContext<'_>, id: &str) -> Result<DealView, PipelineError> {
    let deal = lookup_by_id(ctx.deals, id).ok_or_else(|| PipelineError::not_found("deal", id))?;
    let checklist = ctx.overlay.checklist(deal);
    let notes = ctx
        .overlay
        .state(&deal.id)
        .map(|s| s.notes.clone())
        .or_else(|| deal.notes.clone())
        .unwrap_or_default();

    Ok(DealView {
        deal: DealRow::new(deal, false),
        stage_name: deal.stage_name.clone(),
        margin_percent: deal.margin_percent(),
        risk: score_churn_risk(deal),
        checklist: checklist
            .iter()
            .map(|(criterion, state)| ChecklistRow {
                criterion: criterion.to_string(),
                question: criterion.question().to_string(),
                addressed: state.addressed,
                notes: state.notes.clone(),
            })
            .collect(),
        qualification_score: checklist.qualification_score(),
        notes,
        actions: actions_for_deal(ctx.actions, &deal.id)
            .into_iter()
            .map(|a| ctx.action_row(a))
            .collect(),
    })
}

fn transition_view(
    ctx: &ReportContext<'_>,
    name_or_slug: &str,
) -> Result<TransitionView, PipelineError> {
    let owner = ctx.resolve_owner(name_or_slug)?;
    let policy = TransitionPolicy::from(&ctx.config.transition);
    let report = compute_transition_report(ctx.deals, &owner, &policy)
        .ok_or_else(|| PipelineError::not_found("owner", owner.as_str()))?;

    Ok(TransitionView {
        priority_rows: ctx.rows(&report.priority_deals),
        report,
    })
}

fn risk_view(ctx: &ReportContext<'_>) -> RiskView {
    let min_score = ctx.config.risk.at_risk_score;
    let deals: Vec<RiskRow> = at_risk_deals(ctx.deals, min_score)
        .into_iter()
        .map(|(deal, risk)| RiskRow {
            deal: DealRow::new(deal, false),
            risk,
        })
        .collect();

    RiskView {
        min_score,
        total_amount: deals.iter().map(|r| r.deal.amount).sum(),
        deals,
    }
}
