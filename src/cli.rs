//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::DealSort;
use crate::error::PipelineError;
use crate::models::{ActionStatus, Region};
use crate::review::Criterion;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;

/// PipeReview - sales pipeline review reports from a deal dataset
///
/// Summarize a static deal export by stage, region, owner and account,
/// track action items, and keep MEDDPICC review notes alongside it.
///
/// Examples:
///   pipereview --deals deals.json
///   pipereview --deals export.json --raw --view owners
///   pipereview --deals deals.json --view owner --owner scott-pallardy
///   pipereview --deals deals.json --view actions --status overdue --format json
///   pipereview --deals deals.json --deal deal-004 --mark-reviewed --review-state review.json
///   pipereview --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Deals JSON file to review
    ///
    /// Can also be set via PIPEREVIEW_DEALS or `general.deals` in .pipereview.toml.
    #[arg(short, long, value_name = "FILE", env = "PIPEREVIEW_DEALS")]
    pub deals: Option<PathBuf>,

    /// Treat the deals file as a raw CRM export
    ///
    /// Stages are derived from stage labels and regions from the owner map.
    #[arg(long)]
    pub raw: bool,

    /// Action items JSON file
    ///
    /// When absent, follow-up actions are synthesized for late-stage deals.
    #[arg(short, long, value_name = "FILE")]
    pub actions: Option<PathBuf>,

    /// Review state file (reviewed flags, notes, MEDDPICC checklist)
    #[arg(long, value_name = "FILE")]
    pub review_state: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .pipereview.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report to generate
    #[arg(long, default_value = "summary", value_name = "VIEW")]
    pub view: View,

    /// Region for the region view (west, east, europe)
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Owner name or slug for the owner and transition views
    #[arg(long, value_name = "OWNER")]
    pub owner: Option<String>,

    /// Deal id for the deal view and review edits
    #[arg(long, value_name = "ID")]
    pub deal: Option<String>,

    /// Only list actions with this status
    #[arg(long, value_name = "STATUS")]
    pub status: Option<StatusArg>,

    /// Sort owner and region deal listings
    #[arg(long, default_value = "stage", value_name = "KEY")]
    pub sort: SortArg,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report (stdout if absent)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Reference date for overdue and urgency checks (YYYY-MM-DD)
    ///
    /// Defaults to the current UTC date.
    #[arg(long, value_name = "DATE", env = "PIPEREVIEW_TODAY")]
    pub today: Option<String>,

    /// Rows in "top N" tables
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Fail if any deal is at risk of churning
    ///
    /// Useful for CI pipelines. Exit code 2 when an at-risk deal exists.
    #[arg(long)]
    pub fail_on_risk: bool,

    /// Mark --deal as reviewed
    #[arg(long, conflicts_with = "unmark_reviewed")]
    pub mark_reviewed: bool,

    /// Clear the reviewed flag on --deal
    #[arg(long)]
    pub unmark_reviewed: bool,

    /// Replace the review notes for --deal
    #[arg(long, value_name = "TEXT")]
    pub note: Option<String>,

    /// MEDDPICC criteria to check off for --deal (comma-separated)
    #[arg(long, value_name = "CRITERIA", value_delimiter = ',')]
    pub check: Vec<Criterion>,

    /// MEDDPICC criteria to clear for --deal (comma-separated)
    #[arg(long, value_name = "CRITERIA", value_delimiter = ',')]
    pub uncheck: Vec<Criterion>,

    /// Notes for one MEDDPICC criterion, as CRITERION=TEXT
    ///
    /// Example: --criterion-note "champion=VP of Quality sponsoring"
    #[arg(long, value_name = "CRITERION=TEXT")]
    pub criterion_note: Vec<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .pipereview.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Report views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    /// Pipeline dashboard (default)
    #[default]
    Summary,
    /// All owners ranked by pipeline
    Owners,
    /// One owner's book of business
    Owner,
    /// Accounts ranked by pipeline
    Accounts,
    /// One region's deals
    Region,
    /// Stage velocity, aging and stale deals
    Velocity,
    /// Action items
    Actions,
    /// One deal with its MEDDPICC checklist
    Deal,
    /// Hand-off report for a departing owner
    Transition,
    /// Deals at risk of churning
    Risk,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Sort key for --sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortArg {
    /// Stage, then amount, highest first (default)
    #[default]
    Stage,
    /// Amount, highest first
    Amount,
    /// EGP, highest first
    Egp,
    /// Close date, soonest first
    CloseDate,
}

impl From<SortArg> for DealSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Stage => DealSort::Stage,
            SortArg::Amount => DealSort::Amount,
            SortArg::Egp => DealSort::Egp,
            SortArg::CloseDate => DealSort::CloseDate,
        }
    }
}

/// Action status filter for --status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusArg {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl From<StatusArg> for ActionStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => ActionStatus::Pending,
            StatusArg::InProgress => ActionStatus::InProgress,
            StatusArg::Completed => ActionStatus::Completed,
            StatusArg::Overdue => ActionStatus::Overdue,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        match self.view {
            View::Owner | View::Transition if self.owner.is_none() => {
                return Err(format!("--view {:?} requires --owner", self.view).to_lowercase());
            }
            View::Region if self.region.is_none() => {
                return Err("--view region requires --region".to_string());
            }
            View::Deal if self.deal.is_none() => {
                return Err("--view deal requires --deal".to_string());
            }
            _ => {}
        }

        if self.has_review_edits() {
            if self.deal.is_none() {
                return Err("Review edits require --deal".to_string());
            }
            if self.review_state.is_none() {
                return Err("Review edits require --review-state to save them".to_string());
            }
        }

        self.criterion_notes()?;

        Ok(())
    }

    /// True when any flag changes the review state.
    pub fn has_review_edits(&self) -> bool {
        self.mark_reviewed
            || self.unmark_reviewed
            || self.note.is_some()
            || !self.check.is_empty()
            || !self.uncheck.is_empty()
            || !self.criterion_note.is_empty()
    }

    /// Parsed `--criterion-note` values.
    pub fn criterion_notes(&self) -> Result<Vec<(Criterion, String)>, String> {
        self.criterion_note
            .iter()
            .map(|entry| {
                let (name, text) = entry
                    .split_once('=')
                    .ok_or_else(|| format!("Expected CRITERION=TEXT, got '{}'", entry))?;
                let criterion = <Criterion as clap::ValueEnum>::from_str(name.trim(), true)
                    .map_err(|_| format!("Unknown MEDDPICC criterion '{}'", name.trim()))?;
                Ok((criterion, text.trim().to_string()))
            })
            .collect()
    }

    /// The requested region, if any.
    pub fn region(&self) -> Result<Option<Region>, PipelineError> {
        self.region.as_deref().map(str::parse).transpose()
    }

    /// Reference date: `--today`, else the current UTC date.
    pub fn today(&self) -> Result<NaiveDate, PipelineError> {
        match self.today.as_deref() {
            Some(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map_err(|_| PipelineError::InvalidDate(value.to_string())),
            None => Ok(Utc::now().date_naive()),
        }
    }

    /// Returns the log level. `config_verbose` is `general.verbose` from the
    /// config file; `--quiet` overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            deals: Some(PathBuf::from("deals.json")),
            raw: false,
            actions: None,
            review_state: None,
            config: None,
            view: View::Summary,
            region: None,
            owner: None,
            deal: None,
            status: None,
            sort: SortArg::Stage,
            format: OutputFormat::Markdown,
            output: None,
            today: None,
            top: None,
            fail_on_risk: false,
            mark_reviewed: false,
            unmark_reviewed: false,
            note: None,
            check: Vec::new(),
            uncheck: Vec::new(),
            criterion_note: Vec::new(),
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "pipereview",
            "--deals",
            "deals.json",
            "--view",
            "actions",
            "--status",
            "in-progress",
            "--format",
            "json",
            "--check",
            "champion,economic-buyer",
            "--sort",
            "close-date",
        ])
        .unwrap();

        assert_eq!(args.view, View::Actions);
        assert_eq!(args.status, Some(StatusArg::InProgress));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.check, vec![Criterion::Champion, Criterion::EconomicBuyer]);
        assert_eq!(DealSort::from(args.sort), DealSort::CloseDate);
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_view_requirements() {
        let mut args = make_args();
        args.view = View::Owner;
        assert_eq!(
            args.validate().unwrap_err(),
            "--view owner requires --owner"
        );

        args.owner = Some("scott-pallardy".to_string());
        assert!(args.validate().is_ok());

        args.view = View::Deal;
        assert!(args.validate().is_err());

        args.view = View::Region;
        args.region = Some("europe".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_review_edits() {
        let mut args = make_args();
        args.mark_reviewed = true;
        assert!(args.validate().is_err());

        args.deal = Some("deal-001".to_string());
        assert!(args.validate().is_err());

        args.review_state = Some(PathBuf::from("review.json"));
        assert!(args.validate().is_ok());

        args.criterion_note = vec!["champion".to_string()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_criterion_notes() {
        let mut args = make_args();
        args.criterion_note = vec![
            "champion=VP of Quality sponsoring".to_string(),
            "Paper-Process = MSA in legal".to_string(),
        ];

        let notes = args.criterion_notes().unwrap();
        assert_eq!(notes[0], (Criterion::Champion, "VP of Quality sponsoring".to_string()));
        assert_eq!(notes[1], (Criterion::PaperProcess, "MSA in legal".to_string()));

        args.criterion_note = vec!["budget=yes".to_string()];
        assert!(args.criterion_notes().is_err());
    }

    #[test]
    fn test_region_and_today() {
        let mut args = make_args();
        assert_eq!(args.region().unwrap(), None);

        args.region = Some("Europe".to_string());
        assert_eq!(args.region().unwrap(), Some(Region::Europe));

        args.region = Some("north".to_string());
        assert_eq!(
            args.region().unwrap_err(),
            PipelineError::InvalidRegion("north".to_string())
        );

        args.today = Some("2026-02-11".to_string());
        assert_eq!(args.today().unwrap(), NaiveDate::from_ymd_opt(2026, 2, 11).unwrap());

        args.today = Some("02/11/2026".to_string());
        assert!(matches!(args.today(), Err(PipelineError::InvalidDate(_))));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
