//! PipeReview - sales pipeline review reports
//!
//! A CLI tool that loads a static deal dataset, aggregates it by stage,
//! region, owner and account, and renders Markdown or JSON review reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing file, bad config, unknown owner/deal/region, etc.)
//!   2 - At-risk deals found with --fail-on-risk

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;
mod review;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat, View};
use config::{Config, CONFIG_FILE_NAME};
use ingest::{DatasetLoader, DealFormat};
use models::{ActionItem, Deal};
use report::{ReportContext, ViewRequest};
use review::ReviewOverlay;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so general.verbose applies
    let (mut config, config_path) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("PipeReview v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run(args, config) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Review failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .pipereview.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the owner map, aging buckets, and risk thresholds.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the review workflow. Returns exit code (0 or 2).
fn run(args: Args, config: Config) -> Result<i32> {
    let today = args.today()?;
    debug!("Reference date: {}", today);

    // Step 1: Load the datasets
    let deals_path = deals_path(&args, &config)?;
    let loader = DatasetLoader::new(config.regions.clone());
    let format = if args.raw {
        DealFormat::RawExport
    } else {
        DealFormat::Deals
    };
    let deals = loader.load_deals(&deals_path, format)?;

    let actions = load_actions(&args, &config, &loader, &deals, today)?;

    // Step 2: Apply review state
    let overlay = load_review_state(&args, &deals)?;
    let reviewed = overlay.apply(&deals);
    debug!(
        "{} of {} deals reviewed",
        overlay.reviewed_count(&deals),
        deals.len()
    );

    // Step 3: Build the report
    let request = view_request(&args)?;
    let ctx = ReportContext {
        deals: &reviewed,
        actions: &actions,
        overlay: &overlay,
        config: &config,
        today,
        sort: args.sort.into(),
    };
    let report = report::build_report(&ctx, &request, &deals_path.display().to_string())?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    // Step 4: Write the report
    match args.output {
        Some(ref path) => {
            report::write_report(&output, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("✅ Report saved to: {}", path.display());
            }
        }
        None => println!("{}", output),
    }

    // Check --fail-on-risk
    if args.fail_on_risk {
        let at_risk = analysis::at_risk_deals(&reviewed, config.risk.at_risk_score);
        if !at_risk.is_empty() {
            eprintln!(
                "\n⛔ {} deals at churn risk score {} or above. Failing (exit code 2).",
                at_risk.len(),
                config.risk.at_risk_score
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Load configuration from `--config`, else from the default location.
///
/// Returns the path it was loaded from, or `None` when defaults are used.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => Ok((config, Some(PathBuf::from(CONFIG_FILE_NAME)))),
        None => Ok((Config::default(), None)),
    }
}

/// Deals file from the CLI, else from the config file.
fn deals_path(args: &Args, config: &Config) -> Result<PathBuf> {
    args.deals
        .clone()
        .or_else(|| config.general.deals.as_ref().map(PathBuf::from))
        .context("No deals file given. Use --deals, PIPEREVIEW_DEALS, or general.deals")
}

/// Load action items, or synthesize them when no file is configured.
fn load_actions(
    args: &Args,
    config: &Config,
    loader: &DatasetLoader,
    deals: &[Deal],
    today: chrono::NaiveDate,
) -> Result<Vec<ActionItem>> {
    let path = args
        .actions
        .clone()
        .or_else(|| config.general.actions.as_ref().map(PathBuf::from));

    let actions = match path {
        Some(path) => loader.load_actions(&path)?,
        None => {
            let synthesized = ingest::synthesize_actions(deals, &config.actions, today);
            info!("Synthesized {} action items", synthesized.len());
            synthesized
        }
    };

    for action in analysis::dangling_action_refs(&actions, deals) {
        warn!(
            "Action {} references unknown deal {}",
            action.id, action.deal_id
        );
    }

    Ok(actions)
}

/// Load the review overlay and apply any edits from the command line.
fn load_review_state(args: &Args, deals: &[Deal]) -> Result<ReviewOverlay> {
    let Some(ref path) = args.review_state else {
        return Ok(ReviewOverlay::new());
    };

    let mut overlay = if path.exists() {
        ReviewOverlay::load(path)?
    } else {
        debug!("Review state {} not found, starting fresh", path.display());
        ReviewOverlay::new()
    };

    if !args.has_review_edits() {
        return Ok(overlay);
    }

    let deal_id = args.deal.as_deref().unwrap_or_default();
    let deal = analysis::lookup_by_id(deals, deal_id)
        .ok_or_else(|| error::PipelineError::not_found("deal", deal_id))?;

    if args.mark_reviewed {
        overlay.mark_reviewed(deal, true);
    }
    if args.unmark_reviewed {
        overlay.mark_reviewed(deal, false);
    }
    if let Some(ref note) = args.note {
        overlay.set_notes(deal, note);
    }
    for criterion in &args.check {
        overlay.set_criterion(deal, *criterion, true);
    }
    for criterion in &args.uncheck {
        overlay.set_criterion(deal, *criterion, false);
    }
    let criterion_notes = args.criterion_notes().map_err(anyhow::Error::msg)?;
    for (criterion, text) in criterion_notes {
        overlay.set_criterion_notes(deal, criterion, &text);
    }

    overlay.save(path)?;
    info!("Saved review state for {} to {}", deal.id, path.display());

    Ok(overlay)
}

/// Translate the view flags into a report request.
fn view_request(args: &Args) -> Result<ViewRequest> {
    let owner = || args.owner.clone().unwrap_or_default();

    let request = match args.view {
        View::Summary => ViewRequest::Summary,
        View::Owners => ViewRequest::Owners,
        View::Owner => ViewRequest::Owner(owner()),
        View::Accounts => ViewRequest::Accounts,
        View::Region => {
            let region = args
                .region()?
                .context("--view region requires --region")?;
            ViewRequest::Region(region)
        }
        View::Velocity => ViewRequest::Velocity,
        View::Actions => ViewRequest::Actions {
            status: args.status.map(Into::into),
            owner: args.owner.clone(),
        },
        View::Deal => ViewRequest::Deal(args.deal.clone().unwrap_or_default()),
        View::Transition => ViewRequest::Transition(owner()),
        View::Risk => ViewRequest::Risk,
    };

    Ok(request)
}
