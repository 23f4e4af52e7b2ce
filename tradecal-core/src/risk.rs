//! Trailing stop and drawdown.
//!
//! **Core rule:** the trailing stop rises with cumulative profit and never
//! falls back, even after losses.

use crate::calendar::{DayKey, MonthKey};
use crate::domain::{AccountBaseline, Record};
use crate::equity::{daily_pnl_totals, start_balance};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Remaining margin below this share of the current balance flags the account.
pub const AT_RISK_FRACTION: f64 = 0.10;

// ─── Trailing stop ──────────────────────────────────────────────────

/// `max(floor, floor + max(0, all_time_pnl))`.
pub fn trailing_stop(baseline: &AccountBaseline, all_time_pnl: f64) -> f64 {
    let floor = baseline.stop_floor;
    floor.max(floor + all_time_pnl.max(0.0))
}

/// Margin left between the balance and the stop.
pub fn drawdown_remaining(current_balance: f64, trailing_stop: f64) -> f64 {
    current_balance - trailing_stop
}

pub fn is_at_risk(remaining: f64, current_balance: f64) -> bool {
    remaining < current_balance * AT_RISK_FRACTION
}

/// High-water mark that only moves up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopRatchet {
    level: f64,
}

impl StopRatchet {
    pub fn new(initial: f64) -> Self {
        Self { level: initial }
    }

    /// Offer a new level; returns the ratcheted one.
    pub fn apply(&mut self, proposed: f64) -> f64 {
        self.level = self.level.max(proposed);
        self.level
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

/// Highest cumulative PnL reached along the daily series, never below zero.
pub fn peak_cumulative_pnl<'a, I>(daily_pnl: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut ratchet = StopRatchet::new(0.0);
    let mut running = 0.0;
    for pnl in daily_pnl {
        running += pnl;
        ratchet.apply(running);
    }
    ratchet.level()
}

/// Trailing stop figures for one account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopStatus {
    pub stop_floor: f64,
    pub trailing_stop: f64,
    pub current_balance: f64,
    pub remaining: f64,
    pub is_at_risk: bool,
}

impl StopStatus {
    /// Evaluate against the current all-time PnL. `None` when the stop is disabled.
    pub fn evaluate(baseline: &AccountBaseline, all_time_pnl: f64) -> Option<Self> {
        Self::evaluate_with_peak(baseline, all_time_pnl, all_time_pnl)
    }

    /// Evaluate with the stop raised to the best cumulative PnL seen so far.
    ///
    /// `peak_pnl` below `all_time_pnl` is ignored.
    pub fn evaluate_with_peak(
        baseline: &AccountBaseline,
        all_time_pnl: f64,
        peak_pnl: f64,
    ) -> Option<Self> {
        if !baseline.trailing_enabled() {
            return None;
        }
        let stop = trailing_stop(baseline, peak_pnl.max(all_time_pnl));
        let current = baseline.current_balance(all_time_pnl);
        let remaining = drawdown_remaining(current, stop);
        Some(Self {
            stop_floor: baseline.stop_floor,
            trailing_stop: stop,
            current_balance: current,
            remaining,
            is_at_risk: is_at_risk(remaining, current),
        })
    }
}

// ─── Drawdown ───────────────────────────────────────────────────────

/// Deepest peak-to-trough decline over ordered `(date, pnl_delta)` steps.
///
/// Returned as a negative number; `None` when the balance never fell below a
/// prior peak.
pub fn max_drawdown(steps: &[(DayKey, f64)], start_balance: f64) -> Option<f64> {
    let mut peak = start_balance;
    let mut running = start_balance;
    let mut worst = 0.0_f64;

    for &(_, delta) in steps {
        running += delta;
        if running > peak {
            peak = running;
        }
        let dd = running - peak;
        if dd < worst {
            worst = dd;
        }
    }

    (worst < 0.0).then_some(worst)
}

/// Drawdown within `month`, starting from the balance at the month's open.
pub fn month_max_drawdown(
    records: &[Record],
    baseline: &AccountBaseline,
    month: MonthKey,
    offset: FixedOffset,
) -> Option<f64> {
    let totals = daily_pnl_totals(records, offset);
    let carried: f64 = totals.range(..month.first_day()).map(|(_, pnl)| pnl).sum();
    let opening = start_balance(baseline, &totals) + carried;
    let steps: Vec<(DayKey, f64)> = totals
        .range(month.first_day()..=month.last_day())
        .map(|(&date, &pnl)| (date, pnl))
        .collect();
    max_drawdown(&steps, opening)
}

/// The more severe of a computed drawdown and a separately recorded one.
///
/// Recorded figures are read as magnitudes, so `850` and `-850` agree.
pub fn worst_drawdown(computed: Option<f64>, recorded: Option<f64>) -> Option<f64> {
    let recorded = recorded.map(|v| -v.abs()).filter(|v| *v < 0.0);
    match (computed, recorded) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Status;
    use chrono::NaiveDate;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    // ── Trailing stop ──

    #[test]
    fn stop_rises_with_profit_only() {
        let b = AccountBaseline::new(500.0).with_stop_floor(100.0);
        assert_eq!(trailing_stop(&b, 0.0), 100.0);
        assert_eq!(trailing_stop(&b, 250.0), 350.0);
        assert_eq!(trailing_stop(&b, -300.0), 100.0);
    }

    #[test]
    fn ratchet_never_loosens() {
        let mut r = StopRatchet::new(100.0);
        assert_eq!(r.apply(120.0), 120.0);
        assert_eq!(r.apply(90.0), 120.0);
        assert_eq!(r.level(), 120.0);
    }

    #[test]
    fn peak_tracks_best_prefix() {
        assert_eq!(peak_cumulative_pnl(&[100.0, -40.0, 10.0]), 100.0);
        assert_eq!(peak_cumulative_pnl(&[-50.0, -10.0]), 0.0);
        assert_eq!(peak_cumulative_pnl(&Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn status_with_zero_records() {
        let b = AccountBaseline::new(500.0).with_stop_floor(100.0);
        let s = StopStatus::evaluate(&b, 0.0).unwrap();
        assert_eq!(s.trailing_stop, 100.0);
        assert_eq!(s.current_balance, 500.0);
        assert_eq!(s.remaining, 400.0);
        assert!(!s.is_at_risk);
    }

    #[test]
    fn status_disabled_without_floor() {
        assert!(StopStatus::evaluate(&AccountBaseline::new(500.0), 10.0).is_none());
    }

    #[test]
    fn status_at_risk_near_stop() {
        let b = AccountBaseline::new(1_000.0).with_stop_floor(950.0);
        let s = StopStatus::evaluate(&b, 0.0).unwrap();
        assert_eq!(s.remaining, 50.0);
        assert!(s.is_at_risk);
    }

    #[test]
    fn status_keeps_stop_at_peak_after_giveback() {
        let b = AccountBaseline::new(1_000.0).with_stop_floor(900.0);
        let s = StopStatus::evaluate_with_peak(&b, 20.0, 100.0).unwrap();
        assert_eq!(s.trailing_stop, 1_000.0);
        assert_eq!(s.current_balance, 1_020.0);
        assert_eq!(s.remaining, 20.0);
        assert!(s.is_at_risk);
    }

    // ── Drawdown ──

    #[test]
    fn drawdown_none_when_only_rising() {
        assert_eq!(max_drawdown(&[(d(1), 10.0), (d(2), 5.0)], 100.0), None);
        assert_eq!(max_drawdown(&[], 100.0), None);
    }

    #[test]
    fn drawdown_from_running_peak() {
        let steps = [(d(1), 100.0), (d(2), -30.0), (d(3), -40.0), (d(4), 200.0), (d(5), -50.0)];
        assert_eq!(max_drawdown(&steps, 1_000.0), Some(-70.0));
    }

    #[test]
    fn month_drawdown_opens_at_carried_balance() {
        let records = vec![
            Record::new("0", "main", "2024-02-20", Status::Win).with_pnl("500"),
            Record::new("1", "main", "2024-03-01", Status::Loss).with_pnl("-100"),
            Record::new("2", "main", "2024-03-02", Status::Win).with_pnl("30"),
            Record::new("3", "main", "2024-04-01", Status::Loss).with_pnl("-900"),
        ];
        let b = AccountBaseline::new(1_000.0);
        let march = MonthKey::new(2024, 3).unwrap();
        assert_eq!(month_max_drawdown(&records, &b, march, utc()), Some(-100.0));
    }

    #[test]
    fn worst_of_computed_and_recorded() {
        assert_eq!(worst_drawdown(Some(-70.0), Some(-850.0)), Some(-850.0));
        assert_eq!(worst_drawdown(Some(-70.0), Some(20.0)), Some(-70.0));
        assert_eq!(worst_drawdown(None, Some(850.0)), Some(-850.0));
        assert_eq!(worst_drawdown(Some(-5.0), None), Some(-5.0));
        assert_eq!(worst_drawdown(None, Some(0.0)), None);
        assert_eq!(worst_drawdown(None, None), None);
    }
}
