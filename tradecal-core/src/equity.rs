//! Equity curve builder.
//!
//! Daily PnL totals are accumulated over the full history, then sampled once
//! per calendar day of the requested month. Days without activity carry the
//! previous balance forward, so the curve is a step function.

use crate::calendar::{DayKey, MonthKey};
use crate::domain::{AccountBaseline, Record};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sampled point of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: DayKey,
    pub balance: f64,
}

/// Sum of terminal PnL per calendar day across every month.
///
/// Records with an invalid timestamp or unparsable PnL are skipped.
pub fn daily_pnl_totals(records: &[Record], offset: FixedOffset) -> BTreeMap<DayKey, f64> {
    let mut totals = BTreeMap::new();
    for record in records.iter().filter(|r| r.is_terminal()) {
        let Some(day) = record.day_key(offset) else {
            continue;
        };
        let Some(pnl) = record.pnl_value() else {
            continue;
        };
        *totals.entry(day).or_insert(0.0) += pnl;
    }
    totals
}

/// Running balance after each active day, starting from `start_balance`.
pub fn cumulative_series(totals: &BTreeMap<DayKey, f64>, start_balance: f64) -> Vec<EquityPoint> {
    let mut running = start_balance;
    totals
        .iter()
        .map(|(&date, &pnl)| {
            running += pnl;
            EquityPoint {
                date,
                balance: running,
            }
        })
        .collect()
}

/// Sample a cumulative series on every day of `month`.
///
/// Days before the first entry hold `start_balance`.
pub fn curve_for_month(
    series: &[EquityPoint],
    start_balance: f64,
    month: MonthKey,
) -> Vec<EquityPoint> {
    let mut cursor = 0;
    let mut balance = start_balance;
    month
        .days()
        .map(|date| {
            while cursor < series.len() && series[cursor].date <= date {
                balance = series[cursor].balance;
                cursor += 1;
            }
            EquityPoint { date, balance }
        })
        .collect()
}

/// Balance before any recorded activity.
///
/// With a balance override the start is reconciled backwards so that the last
/// cumulative point equals the override.
pub fn start_balance(baseline: &AccountBaseline, totals: &BTreeMap<DayKey, f64>) -> f64 {
    let dated_pnl: f64 = totals.values().sum();
    baseline.start_balance(dated_pnl)
}

/// Daily equity curve for `month`, one point per calendar day.
pub fn build_curve(
    records: &[Record],
    baseline: &AccountBaseline,
    month: MonthKey,
    offset: FixedOffset,
) -> Vec<EquityPoint> {
    let totals = daily_pnl_totals(records, offset);
    let start = start_balance(baseline, &totals);
    let series = cumulative_series(&totals, start);
    curve_for_month(&series, start, month)
}

/// Compress a curve for charting: first point, every balance change, last point.
///
/// A flat curve collapses to its two endpoints.
pub fn change_points(curve: &[EquityPoint]) -> Vec<EquityPoint> {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return Vec::new();
    };

    let mut kept = vec![*first];
    for pair in curve.windows(2) {
        if pair[1].balance != pair[0].balance {
            kept.push(pair[1]);
        }
    }

    if kept.last().map(|p| p.date) != Some(last.date) {
        kept.push(*last);
    }
    kept
}
