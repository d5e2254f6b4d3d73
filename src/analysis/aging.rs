//! Aging distribution and stale-deal detection.

use crate::error::PipelineError;
use crate::models::{percent, AgingBucket, AgingThreshold, Deal};

use super::aggregator::{rank_by, SortDirection};

/// The default day ranges: 0-30, 31-90, 91-180, 181-365, 366+.
pub fn default_thresholds() -> Vec<AgingThreshold> {
    vec![
        AgingThreshold::new("0-30 days", 0, Some(30)),
        AgingThreshold::new("31-90 days", 31, Some(90)),
        AgingThreshold::new("91-180 days", 91, Some(180)),
        AgingThreshold::new("181-365 days", 181, Some(365)),
        AgingThreshold::new("365+ days", 366, None),
    ]
}

/// Check that thresholds start at 0, are contiguous, and end open-ended,
/// so every `days_open` value lands in exactly one bucket.
pub fn validate_thresholds(thresholds: &[AgingThreshold]) -> Result<(), PipelineError> {
    let first = thresholds
        .first()
        .ok_or_else(|| PipelineError::InvalidAgingBuckets("no buckets configured".to_string()))?;

    if first.min != 0 {
        return Err(PipelineError::InvalidAgingBuckets(format!(
            "first bucket '{}' must start at 0, starts at {}",
            first.label, first.min
        )));
    }

    for pair in thresholds.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let prev_max = prev.max.ok_or_else(|| {
            PipelineError::InvalidAgingBuckets(format!(
                "bucket '{}' is open-ended but is not the last bucket",
                prev.label
            ))
        })?;

        if prev_max < prev.min {
            return Err(PipelineError::InvalidAgingBuckets(format!(
                "bucket '{}' has max {} below min {}",
                prev.label, prev_max, prev.min
            )));
        }

        let expected = prev_max.checked_add(1).ok_or_else(|| {
            PipelineError::InvalidAgingBuckets(format!(
                "bucket '{}' ends at {} and leaves no room for '{}'",
                prev.label, prev_max, next.label
            ))
        })?;

        if next.min != expected {
            return Err(PipelineError::InvalidAgingBuckets(format!(
                "bucket '{}' ends at {} but '{}' starts at {}",
                prev.label, prev_max, next.label, next.min
            )));
        }
    }

    if let Some(last) = thresholds.last() {
        if last.max.is_some() {
            return Err(PipelineError::InvalidAgingBuckets(format!(
                "last bucket '{}' must be open-ended",
                last.label
            )));
        }
    }

    Ok(())
}

/// Partition deals into aging buckets by `days_open`.
///
/// Thresholds should be validated with [`validate_thresholds`] first; each
/// deal is counted in the first bucket that contains it, so overlapping
/// ranges never double count.
pub fn compute_aging_buckets(deals: &[Deal], thresholds: &[AgingThreshold]) -> Vec<AgingBucket> {
    let mut buckets: Vec<AgingBucket> = thresholds
        .iter()
        .map(|t| AgingBucket {
            label: t.label.clone(),
            min: t.min,
            max: t.max,
            deal_count: 0,
            total_amount: 0.0,
            percent_of_total: 0.0,
        })
        .collect();

    for deal in deals {
        if let Some(index) = thresholds.iter().position(|t| t.contains(deal.days_open)) {
            buckets[index].deal_count += 1;
            buckets[index].total_amount += deal.amount;
        }
    }

    let total = deals.len() as f64;
    for bucket in &mut buckets {
        bucket.percent_of_total = percent(bucket.deal_count as f64, total);
    }

    buckets
}

/// Deals open longer than `min_days`, oldest first.
pub fn stale_deals(deals: &[Deal], min_days: u32) -> Vec<&Deal> {
    rank_by(
        aging_deals(deals, min_days),
        |d| d.days_open,
        SortDirection::Descending,
    )
}

/// Deals open longer than `min_days`, in dataset order.
pub fn aging_deals<'a, I>(deals: I, min_days: u32) -> Vec<&'a Deal>
where
    I: IntoIterator<Item = &'a Deal>,
{
    deals
        .into_iter()
        .filter(|d| d.days_open > min_days)
        .collect()
}
