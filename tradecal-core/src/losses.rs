//! Loss-reason analyzer.
//!
//! Losing records are grouped by their first cause code. Codes are opaque
//! here; labels and emoji live in the report layer's catalog.

use crate::aggregate::round_half_up;
use crate::domain::{Record, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bucket for losses recorded without a cause.
pub const UNSPECIFIED_REASON: &str = "unspecified";

/// One ranked cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonShare {
    pub code: String,
    pub count: usize,
    /// Sum of absolute PnL.
    pub total_pnl: f64,
    pub avg_pnl: f64,
    /// Share of all losses, 0–100.
    pub percentage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossBreakdown {
    pub total_losses: usize,
    /// Sum of absolute losing PnL, unspecified bucket included.
    pub total_loss_pnl: f64,
    /// Losses without a cause code.
    pub unspecified: usize,
    /// Ranked by count, most frequent first; ties by code.
    pub reasons: Vec<ReasonShare>,
}

#[derive(Default)]
struct Bucket {
    count: usize,
    total: f64,
}

/// Break `LOSS` records down by primary cause.
pub fn analyze_losses<'a, I>(records: I) -> LossBreakdown
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buckets: BTreeMap<&str, Bucket> = BTreeMap::new();
    let mut breakdown = LossBreakdown::default();

    for record in records.into_iter().filter(|r| r.status == Status::Loss) {
        let pnl = record.pnl_value().map(f64::abs).unwrap_or(0.0);
        breakdown.total_losses += 1;
        breakdown.total_loss_pnl += pnl;

        match record.primary_loss_reason() {
            Some(code) => {
                let bucket = buckets.entry(code).or_default();
                bucket.count += 1;
                bucket.total += pnl;
            }
            None => breakdown.unspecified += 1,
        }
    }

    let total = breakdown.total_losses;
    let mut reasons: Vec<ReasonShare> = buckets
        .into_iter()
        .map(|(code, bucket)| ReasonShare {
            code: code.to_string(),
            count: bucket.count,
            total_pnl: bucket.total,
            avg_pnl: bucket.total / bucket.count as f64,
            percentage: round_half_up(bucket.count as f64 / total as f64 * 100.0) as u32,
        })
        .collect();

    // BTreeMap order is by code; a stable sort keeps that for ties.
    reasons.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown.reasons = reasons;
    breakdown
}
