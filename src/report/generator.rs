//! Markdown and JSON report generation.
//!
//! This module renders the assembled report views as Markdown tables, or
//! serializes them as JSON.

use super::views::{
    AccountsView, ActionRow, ActionsView, DashboardView, DealRow, DealView, OwnerRow, OwnerView,
    OwnersView, RegionView, Report, ReportMetadata, ReportView, RiskView, TransitionView,
    VelocityView,
};
use crate::analysis::ActionStats;
use crate::models::{AccountMetrics, ActionStatus, Metrics, Stage, StageCounts, StageMetrics};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Format an amount as whole dollars with thousands separators.
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Format a percentage to one decimal place.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", report.metadata.title));
    output.push_str(&generate_metadata_section(&report.metadata));

    let body = match &report.view {
        ReportView::Summary(view) => generate_dashboard(view),
        ReportView::Owners(view) => generate_owners(view),
        ReportView::Owner(view) => generate_owner(view),
        ReportView::Accounts(view) => generate_accounts(view),
        ReportView::Region(view) => generate_region(view),
        ReportView::Velocity(view) => generate_velocity(view),
        ReportView::Actions(view) => generate_actions(view),
        ReportView::Deal(view) => generate_deal(view),
        ReportView::Transition(view) => generate_transition(view),
        ReportView::Risk(view) => generate_risk(view),
    };
    output.push_str(&body);

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!("- **As Of:** {}\n", metadata.as_of));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Deals:** {}\n", metadata.deal_count));
    section.push_str(&format!("- **Action Items:** {}\n", metadata.action_count));
    section.push('\n');

    section
}

/// Headline numbers shared by owner and region pages.
fn generate_metrics_block(metrics: &Metrics) -> String {
    let mut block = String::new();

    block.push_str("| Deals | Pipeline | EGP | Margin | Avg Deal | Avg Days Open | Reviewed |\n");
    block.push_str("|:---:|---:|---:|:---:|---:|:---:|:---:|\n");
    block.push_str(&format!(
        "| {} | {} | {} | {} | {} | {:.0} | {}/{} |\n\n",
        metrics.deal_count,
        format_currency(metrics.total_amount),
        format_currency(metrics.total_egp),
        format_percent(metrics.margin_percent),
        format_currency(metrics.avg_deal_size),
        metrics.avg_days_open,
        metrics.reviewed_count,
        metrics.deal_count,
    ));

    block.push_str(&generate_stage_counts(&metrics.by_stage));
    block.push_str(&format!(
        "**Stage 4 Pipeline:** {}\n\n",
        format_currency(metrics.stage4_pipeline)
    ));

    block
}

/// One-row table of deal counts, highest stage first.
fn generate_stage_counts(counts: &StageCounts) -> String {
    let mut table = String::new();

    for stage in Stage::DESCENDING {
        table.push_str(&format!("| Stage {} ", stage.number()));
    }
    table.push_str("| **Total** |\n");
    table.push_str(&"|:---:".repeat(Stage::DESCENDING.len() + 1));
    table.push_str("|\n");
    for stage in Stage::DESCENDING {
        table.push_str(&format!("| {} ", counts.get(stage)));
    }
    table.push_str(&format!("| **{}** |\n\n", counts.total()));

    table
}

fn generate_deal_table(deals: &[DealRow]) -> String {
    if deals.is_empty() {
        return "No deals.\n\n".to_string();
    }

    let mut table = String::new();
    table.push_str(
        "| Deal | Account | Owner | Stage | Amount | EGP | Close | Days Open | Flags |\n",
    );
    table.push_str("|:---|:---|:---|:---|---:|---:|:---:|:---:|:---|\n");

    for deal in deals {
        let reviewed = if deal.reviewed { " ✅" } else { "" };
        table.push_str(&format!(
            "| {}{} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            deal.opportunity_name,
            reviewed,
            deal.account_name,
            deal.owner,
            deal.stage,
            format_currency(deal.amount),
            format_currency(deal.egp),
            deal.close_date,
            deal.days_open,
            deal.risk_flags.join(", "),
        ));
    }
    table.push('\n');

    table
}

fn generate_stage_table(stages: &[StageMetrics]) -> String {
    let mut table = String::new();
    table.push_str("| Stage | Deals | Pipeline | EGP | Avg Days Open |\n");
    table.push_str("|:---|:---:|---:|---:|:---:|\n");

    for stage in stages {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {:.0} |\n",
            stage.stage,
            stage.deal_count,
            format_currency(stage.total_amount),
            format_currency(stage.total_egp),
            stage.avg_days_open,
        ));
    }
    table.push('\n');

    table
}

fn generate_account_table(accounts: &[AccountMetrics]) -> String {
    if accounts.is_empty() {
        return "No accounts.\n\n".to_string();
    }

    let mut table = String::new();
    table.push_str("| Account | Deals | Pipeline | EGP | S4 | S3 | S2 | S1 |\n");
    table.push_str("|:---|:---:|---:|---:|:---:|:---:|:---:|:---:|\n");

    for account in accounts {
        let histogram = &account.stage_histogram;
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            account.account_name,
            account.deal_count,
            format_currency(account.total_amount),
            format_currency(account.total_egp),
            histogram.stage4,
            histogram.stage3,
            histogram.stage2,
            histogram.stage1,
        ));
    }
    table.push('\n');

    table
}

fn generate_owner_table(owners: &[OwnerRow]) -> String {
    let mut table = String::new();
    table.push_str("| Owner | Deals | Pipeline | EGP | Margin | Stage 4 Pipeline | Reviewed |\n");
    table.push_str("|:---|:---:|---:|---:|:---:|---:|:---:|\n");

    for row in owners {
        table.push_str(&format!(
            "| {} (`{}`) | {} | {} | {} | {} | {} | {}/{} |\n",
            row.owner,
            row.slug,
            row.metrics.deal_count,
            format_currency(row.metrics.total_amount),
            format_currency(row.metrics.total_egp),
            format_percent(row.metrics.margin_percent),
            format_currency(row.metrics.stage4_pipeline),
            row.metrics.reviewed_count,
            row.metrics.deal_count,
        ));
    }
    table.push('\n');

    table
}

fn status_badge(status: ActionStatus) -> &'static str {
    match status {
        ActionStatus::Pending => "⚪ Pending",
        ActionStatus::InProgress => "🔵 In Progress",
        ActionStatus::Completed => "🟢 Completed",
        ActionStatus::Overdue => "🔴 Overdue",
    }
}

fn generate_action_table(actions: &[ActionRow]) -> String {
    if actions.is_empty() {
        return "No action items.\n\n".to_string();
    }

    let mut table = String::new();
    table.push_str("| Due | Status | Deal | Action | Owner |\n");
    table.push_str("|:---:|:---|:---|:---|:---|\n");

    for action in actions {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            action.due_date,
            status_badge(action.status),
            action.deal_name,
            action.action,
            action.owner,
        ));
    }
    table.push('\n');

    table
}

fn generate_action_stats(stats: &ActionStats) -> String {
    let mut table = String::new();
    table.push_str("| Total | Pending | In Progress | Completed | Overdue |\n");
    table.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    table.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        stats.total, stats.pending, stats.in_progress, stats.completed, stats.overdue
    ));
    table
}

fn generate_dashboard(view: &DashboardView) -> String {
    let mut section = String::new();
    let summary = &view.summary;

    section.push_str("## Summary\n\n");
    section.push_str("| Deals | Pipeline | EGP | Margin | Avg Deal | Commit | Reviewed |\n");
    section.push_str("|:---:|---:|---:|:---:|---:|---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} ({}) | {}/{} |\n\n",
        summary.deal_count,
        format_currency(summary.total_amount),
        format_currency(summary.total_egp),
        format_percent(summary.margin_percent),
        format_currency(summary.avg_deal_size),
        format_currency(summary.commit_amount),
        summary.commit_count,
        summary.reviewed_count,
        summary.deal_count,
    ));

    section.push_str("### Deals by Stage\n\n");
    section.push_str(&generate_stage_counts(&summary.by_stage));

    section.push_str("### Regions\n\n");
    section.push_str("| Region | Deals | Pipeline | EGP | Stage 4 Pipeline |\n");
    section.push_str("|:---|:---:|---:|---:|---:|\n");
    for row in &view.regions {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            row.region,
            summary.by_region.get(row.region),
            format_currency(row.metrics.total_amount),
            format_currency(row.metrics.total_egp),
            format_currency(row.metrics.stage4_pipeline),
        ));
    }
    section.push('\n');

    if view.stale_count > 0 || view.at_risk_count > 0 {
        section.push_str("### Attention\n\n");
        section.push_str(&format!(
            "- ⚠️ **Stale deals:** {} ({})\n",
            view.stale_count,
            format_currency(view.stale_amount)
        ));
        section.push_str(&format!("- 🔥 **At-risk deals:** {}\n\n", view.at_risk_count));
    }

    section.push_str("### Top Owners\n\n");
    section.push_str(&generate_owner_table(&view.top_owners));

    if !view.urgent.is_empty() {
        section.push_str("### Closing Soon\n\n");
        section.push_str(&generate_deal_table(&view.urgent));
    }

    section.push_str("### Review Queue\n\n");
    if view.review_queue.is_empty() {
        section.push_str("All deals have been reviewed. 🎉\n\n");
    } else {
        section.push_str(&generate_deal_table(&view.review_queue));
    }

    section
}

fn generate_owners(view: &OwnersView) -> String {
    let mut section = String::new();

    section.push_str("## Owners\n\n");
    section.push_str(&generate_owner_table(&view.owners));
    section.push_str(&format!(
        "**Total Stage 4 Pipeline:** {}\n\n",
        format_currency(view.total_stage4_pipeline)
    ));

    section
}

fn generate_owner(view: &OwnerView) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str(&generate_metrics_block(&view.metrics));

    if view.aging_count > 0 {
        section.push_str(&format!(
            "> ⚠️ {} deals open more than {} days ({})\n\n",
            view.aging_count,
            view.aging_days,
            format_currency(view.aging_amount)
        ));
    }

    section.push_str("## Stages\n\n");
    section.push_str(&generate_stage_table(&view.stages));

    section.push_str("## Top Accounts\n\n");
    section.push_str(&generate_account_table(&view.top_accounts));

    section.push_str("## Deals\n\n");
    section.push_str(&generate_deal_table(&view.deals));

    section
}

fn generate_accounts(view: &AccountsView) -> String {
    let mut section = String::new();

    section.push_str("## Accounts\n\n");
    section.push_str(&format!(
        "{} accounts, {} with more than one deal.\n\n",
        view.accounts.len(),
        view.multi_deal_accounts
    ));
    section.push_str(&generate_account_table(&view.accounts));

    section
}

fn generate_region(view: &RegionView) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str(&generate_metrics_block(&view.metrics));
    section.push_str("## Deals\n\n");
    section.push_str(&generate_deal_table(&view.deals));

    section
}

fn generate_velocity(view: &VelocityView) -> String {
    let mut section = String::new();

    section.push_str("## Velocity\n\n");
    section.push_str(&format!(
        "**Average days open:** {:.0}\n\n",
        view.avg_days_open
    ));
    section.push_str(&generate_stage_table(&view.stages));

    section.push_str("## Aging\n\n");
    section.push_str("| Bucket | Deals | Pipeline | Share |\n");
    section.push_str("|:---|:---:|---:|:---:|\n");
    for bucket in &view.aging {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            bucket.label,
            bucket.deal_count,
            format_currency(bucket.total_amount),
            format_percent(bucket.percent_of_total),
        ));
    }
    section.push('\n');

    section.push_str(&format!(
        "## Closing This Quarter ({} to {})\n\n",
        view.quarter_start, view.quarter_end
    ));
    section.push_str(&format!(
        "{} deals, {}\n\n",
        view.closing_this_quarter.len(),
        format_currency(view.quarter_amount)
    ));
    section.push_str(&generate_deal_table(&view.closing_this_quarter));

    section.push_str(&format!("## Stale Deals ({}+ days)\n\n", view.stale_days));
    if view.stale.is_empty() {
        section.push_str("No stale deals.\n\n");
    } else {
        section.push_str(&format!(
            "{} deals, {}\n\n",
            view.stale.len(),
            format_currency(view.stale_amount)
        ));
        section.push_str(&generate_deal_table(&view.stale));
    }

    section
}

fn generate_actions(view: &ActionsView) -> String {
    let mut section = String::new();

    section.push_str("## Status\n\n");
    section.push_str(&generate_action_stats(&view.stats));

    section.push_str("## Action Items\n\n");
    section.push_str(&generate_action_table(&view.items));

    if !view.owners.is_empty() {
        section.push_str(&format!("**Owners:** {}\n\n", view.owners.join(", ")));
    }

    if !view.dangling.is_empty() {
        section.push_str(&format!(
            "> ⚠️ Actions referencing unknown deals: {}\n\n",
            view.dangling.join(", ")
        ));
    }

    section
}

fn generate_deal(view: &DealView) -> String {
    let mut section = String::new();
    let deal = &view.deal;

    section.push_str("## Details\n\n");
    section.push_str(&format!("- **Id:** `{}`\n", deal.id));
    section.push_str(&format!("- **Account:** {}\n", deal.account_name));
    section.push_str(&format!("- **Owner:** {} ({})\n", deal.owner, deal.region));
    match &view.stage_name {
        Some(name) => section.push_str(&format!("- **Stage:** {} ({})\n", deal.stage, name)),
        None => section.push_str(&format!("- **Stage:** {}\n", deal.stage)),
    }
    section.push_str(&format!("- **Forecast:** {}\n", deal.forecast_category));
    section.push_str(&format!("- **Amount:** {}\n", format_currency(deal.amount)));
    section.push_str(&format!(
        "- **EGP:** {} ({} margin)\n",
        format_currency(deal.egp),
        format_percent(view.margin_percent)
    ));
    section.push_str(&format!("- **Close Date:** {}\n", deal.close_date));
    section.push_str(&format!(
        "- **Days Open:** {} ({} in stage)\n",
        deal.days_open, deal.days_in_stage
    ));
    section.push_str(&format!(
        "- **Reviewed:** {}\n\n",
        if deal.reviewed { "yes" } else { "no" }
    ));

    section.push_str("## Churn Risk\n\n");
    if view.risk.flags.is_empty() {
        section.push_str("Score 0, no risk flags.\n\n");
    } else {
        section.push_str(&format!(
            "Score {}: {}\n\n",
            view.risk.risk_score,
            view.risk.flags.join(", ")
        ));
    }

    section.push_str(&format!(
        "## MEDDPICC ({}% qualified)\n\n",
        view.qualification_score
    ));
    for row in &view.checklist {
        let mark = if row.addressed { "x" } else { " " };
        section.push_str(&format!("- [{}] **{}**: {}", mark, row.criterion, row.question));
        if !row.notes.is_empty() {
            section.push_str(&format!(" _{}_", row.notes));
        }
        section.push('\n');
    }
    section.push('\n');

    if !view.notes.is_empty() {
        section.push_str("## Notes\n\n");
        section.push_str(&view.notes);
        section.push_str("\n\n");
    }

    section.push_str("## Action Items\n\n");
    section.push_str(&generate_action_table(&view.actions));

    section
}

fn generate_transition(view: &TransitionView) -> String {
    let mut section = String::new();
    let report = &view.report;

    section.push_str("## Book of Business\n\n");
    section.push_str(&generate_metrics_block(&report.metrics));

    section.push_str("## Stages\n\n");
    section.push_str(&generate_stage_table(&report.stages));

    section.push_str("## Priority Deals\n\n");
    section.push_str(&generate_deal_table(&view.priority_rows));

    section.push_str("## Top Accounts\n\n");
    section.push_str(&generate_account_table(&report.top_accounts));

    section.push_str("## Aging\n\n");
    for slice in &report.aging {
        section.push_str(&format!(
            "- **{}+ days:** {} deals ({})\n",
            slice.min_days,
            slice.deal_count,
            format_currency(slice.total_amount)
        ));
    }
    section.push('\n');

    section
}

fn generate_risk(view: &RiskView) -> String {
    let mut section = String::new();

    section.push_str(&format!("## At-Risk Deals (score {}+)\n\n", view.min_score));
    if view.deals.is_empty() {
        section.push_str("No deals at risk. 🎉\n\n");
        return section;
    }

    section.push_str(&format!(
        "{} deals, {} at risk.\n\n",
        view.deals.len(),
        format_currency(view.total_amount)
    ));
    section.push_str("| Score | Deal | Owner | Stage | Amount | Days Open | Flags |\n");
    section.push_str("|:---:|:---|:---|:---|---:|:---:|:---|\n");
    for row in &view.deals {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            row.risk.risk_score,
            row.deal.opportunity_name,
            row.deal.owner,
            row.deal.stage,
            format_currency(row.deal.amount),
            row.deal.days_open,
            row.risk.flags.join(", "),
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Report generated by PipeReview*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::report::views::tests::{fixture_actions, fixture_deals, today};
    use crate::report::views::{build_report, ReportContext, ViewRequest};
    use crate::review::ReviewOverlay;
    use tempfile::TempDir;

    fn render(request: ViewRequest) -> Report {
        let (deals, actions) = (fixture_deals(), fixture_actions());
        let (overlay, config) = (ReviewOverlay::new(), Config::default());
        let ctx = ReportContext {
            deals: &deals,
            actions: &actions,
            overlay: &overlay,
            config: &config,
            today: today(),
            sort: crate::analysis::DealSort::Stage,
        };
        build_report(&ctx, &request, "fixtures/deals.json").unwrap()
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(999.0), "$999");
        assert_eq!(format_currency(1_000.0), "$1,000");
        assert_eq!(format_currency(1_234_567.4), "$1,234,567");
        assert_eq!(format_currency(89_999.6), "$90,000");
        assert_eq!(format_currency(-2_500.0), "-$2,500");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(40.0), "40.0%");
        assert_eq!(format_percent(33.333), "33.3%");
    }

    #[test]
    fn test_generate_summary_markdown() {
        let report = render(ViewRequest::Summary);
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Pipeline Review"));
        assert!(markdown.contains("- **As Of:** 2026-02-11"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("### Regions"));
        assert!(markdown.contains("| Europe |"));
        assert!(markdown.contains("### Review Queue"));
        assert!(markdown.contains("$1,615,000"));
    }

    #[test]
    fn test_generate_deal_markdown() {
        let report = render(ViewRequest::Deal("deal-002".to_string()));
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Deal: Genentech - QC Lab Automation"));
        assert!(markdown.contains("- [x] **Metrics**"));
        assert!(markdown.contains("- [ ] **Paper Process**"));
        assert!(markdown.contains("## MEDDPICC (50% qualified)"));
        assert!(markdown.contains("Procurement review scheduled for March"));
        assert!(markdown.contains("In Progress"));
    }

    #[test]
    fn test_generate_actions_markdown() {
        let report = render(ViewRequest::Actions {
            status: Some(ActionStatus::Overdue),
            owner: None,
        });
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("🔴 Overdue"));
        assert!(markdown.contains("Takeda - Cell Therapy Suite Expansion"));
        assert!(!markdown.contains("Send revised quote"));
        assert!(markdown.contains("unknown deals: action-004"));
    }

    #[test]
    fn test_generate_risk_and_velocity_markdown() {
        let risk = generate_markdown_report(&render(ViewRequest::Risk));
        assert!(risk.contains("## At-Risk Deals (score 2+)"));
        assert!(risk.contains("365+ days"));
        assert!(risk.contains("No EGP set"));

        let velocity = generate_markdown_report(&render(ViewRequest::Velocity));
        assert!(velocity.contains("## Aging"));
        assert!(velocity.contains("Closing This Quarter (2026-01-01 to 2026-03-31)"));
        assert!(velocity.contains("Stale Deals (180+ days)"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = render(ViewRequest::Owners);
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"kind\": \"owners\""));
        assert!(json.contains("\"asOf\": \"2026-02-11\""));
        assert!(json.contains("\"slug\": \"scott-pallardy\""));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["view"]["owners"][0]["owner"], "Scott Pallardy");
    }

    #[test]
    fn test_write_report() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.md");

        write_report("# Pipeline Review\n", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Pipeline Review\n");
    }
}
