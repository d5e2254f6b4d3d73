//! Domain error types.
//!
//! The aggregator itself never fails on well-formed input; these errors
//! surface at the edges where user input (CLI values, config tables,
//! dataset fields) is turned into domain values.

use thiserror::Error;

/// Errors raised while resolving or validating pipeline inputs.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// A deal, owner, or region that the caller asked for does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Aging bucket thresholds leave a gap or overlap.
    #[error("invalid aging buckets: {0}")]
    InvalidAgingBuckets(String),

    /// A region string outside west/east/europe.
    #[error("invalid region '{0}' (expected west, east or europe)")]
    InvalidRegion(String),

    /// A date that is not ISO `YYYY-MM-DD`.
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

impl PipelineError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }
}
