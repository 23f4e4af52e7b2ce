//! Month report assembly — wires the core computations together for one scope.
//!
//! Entry points:
//! - `MonthReport::build()`: one scope, records already selected.
//! - `build_reports()`: every scope of a snapshot, fanned out with rayon.
//! - `generate_reports()`: config and snapshot read from disk, then either of the above.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradecal_core::aggregate::{
    aggregate, aggregate_period, count_active, day_outcome, DayOutcome, OutcomeRule, Period, Stats,
};
use tradecal_core::calendar::{
    assign_row, current_row, row_weeks_for_month, CalendarError, DayKey, MonthKey,
};
use tradecal_core::domain::{Record, RecordKind, Scope};
use tradecal_core::equity::{build_curve, daily_pnl_totals, EquityPoint};
use tradecal_core::losses::{analyze_losses, ReasonShare};
use tradecal_core::risk::{month_max_drawdown, peak_cumulative_pnl, worst_drawdown, StopStatus};

use crate::catalog::LossReasonCatalog;
use crate::config::{ConfigError, ReportConfig};
use crate::loader::{group_by_scope, load_records, LoadError};

/// Errors from the report layer.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("calendar error: {0}")]
    Calendar(#[from] CalendarError),
    #[error("scope '{0}' has no records and no configured account")]
    UnknownScope(String),
}

/// Current schema version for exported reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// What to report on. `today` is injected so reports are reproducible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportRequest {
    pub month: MonthKey,
    pub today: NaiveDate,
    pub offset: FixedOffset,
}

impl ReportRequest {
    pub fn new(month: MonthKey, today: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            month,
            today,
            offset,
        }
    }
}

/// One calendar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: DayKey,
    pub row: u32,
    pub stats: Stats,
    /// Open positions opened that day.
    pub active: usize,
    pub outcome: DayOutcome,
}

/// One calendar row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub row: u32,
    pub days: Vec<u32>,
    pub stats: Stats,
    /// Open positions opened during the week.
    pub active: usize,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodaySummary {
    pub date: DayKey,
    pub stats: Stats,
    pub active: usize,
}

/// A ranked loss cause with its display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledReason {
    #[serde(flatten)]
    pub share: ReasonShare,
    pub label: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossSummary {
    pub total_losses: usize,
    pub total_loss_pnl: f64,
    pub unspecified: usize,
    pub reasons: Vec<LabeledReason>,
}

impl LossSummary {
    /// Analyze `records` and decorate each cause from `catalog`.
    pub fn from_records<'a, I>(records: I, catalog: &LossReasonCatalog) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let breakdown = analyze_losses(records);
        let reasons = breakdown
            .reasons
            .into_iter()
            .map(|share| LabeledReason {
                label: catalog.label_for(&share.code).to_string(),
                emoji: catalog.emoji_for(&share.code).map(String::from),
                share,
            })
            .collect();
        Self {
            total_losses: breakdown.total_losses,
            total_loss_pnl: breakdown.total_loss_pnl,
            unspecified: breakdown.unspecified,
            reasons,
        }
    }
}

/// Everything the calendar view shows for one scope and month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub scope: Scope,
    pub month: MonthKey,
    pub today: TodaySummary,
    pub days: Vec<DaySummary>,
    pub weeks: Vec<WeekSummary>,
    pub month_stats: Stats,
    pub all_time_stats: Stats,
    pub curve: Vec<EquityPoint>,
    pub stop: Option<StopStatus>,
    /// Worst of the computed and the session-recorded drawdown, negative.
    pub max_drawdown: Option<f64>,
    /// Losses within the month.
    pub losses: LossSummary,
    /// Mean reward-to-risk of the month's records that carry all three levels.
    #[serde(default)]
    pub avg_risk_reward: Option<f64>,
}

impl MonthReport {
    /// Assemble the report for `scope` from its records.
    pub fn build(
        scope: &Scope,
        records: &[Record],
        config: &ReportConfig,
        request: &ReportRequest,
    ) -> Self {
        let ReportRequest {
            month,
            today,
            offset,
        } = *request;
        let baseline = config.baseline_for(scope);
        let rule = outcome_rule(records);

        let mut by_day: BTreeMap<DayKey, Vec<&Record>> = BTreeMap::new();
        for record in records {
            if let Some(day) = record.day_key(offset) {
                by_day.entry(day).or_default().push(record);
            }
        }
        let in_month: Vec<&Record> = by_day
            .range(month.first_day()..=month.last_day())
            .flat_map(|(_, day)| day.iter().copied())
            .collect();

        let days = month
            .days()
            .map(|date| {
                let day_records = by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
                DaySummary {
                    date,
                    row: assign_row(month, date.day()).unwrap_or_default(),
                    stats: aggregate(day_records.iter().copied(), |_| true),
                    active: count_active(day_records.iter().copied(), |_| true),
                    outcome: day_outcome(day_records.iter().copied(), rule),
                }
            })
            .collect();

        let current = current_row(month, today);
        let weeks = row_weeks_for_month(month)
            .into_iter()
            .map(|week| {
                let period = Period::RowWeek {
                    month,
                    row: week.row,
                };
                WeekSummary {
                    stats: aggregate(in_month.iter().copied(), period.predicate(offset)),
                    active: count_active(in_month.iter().copied(), period.predicate(offset)),
                    is_current: current == Some(week.row),
                    row: week.row,
                    days: week.days,
                }
            })
            .collect();

        let today_records = by_day.get(&today).map(Vec::as_slice).unwrap_or(&[]);
        let today_summary = TodaySummary {
            date: today,
            stats: aggregate(today_records.iter().copied(), |_| true),
            active: count_active(today_records.iter().copied(), |_| true),
        };

        let month_stats = aggregate(in_month.iter().copied(), |_| true);
        let all_time_stats = aggregate_period(records, Period::AllTime, offset);

        let curve = build_curve(records, &baseline, month, offset);
        let totals = daily_pnl_totals(records, offset);
        let peak = peak_cumulative_pnl(totals.values());
        let stop = StopStatus::evaluate_with_peak(&baseline, all_time_stats.pnl_total, peak);

        let max_drawdown = worst_drawdown(
            month_max_drawdown(records, &baseline, month, offset),
            config.session_drawdown(scope, month),
        );

        let losses = LossSummary::from_records(in_month.iter().copied(), config.catalog());
        let avg_risk_reward = mean_risk_reward(in_month.iter().copied());

        tracing::debug!(
            scope = %scope,
            month = %month,
            records = records.len(),
            month_records = in_month.len(),
            "assembled month report"
        );

        Self {
            schema_version: SCHEMA_VERSION,
            scope: scope.clone(),
            month,
            today: today_summary,
            days,
            weeks,
            month_stats,
            all_time_stats,
            curve,
            stop,
            max_drawdown,
            losses,
            avg_risk_reward,
        }
    }

    pub fn current_week(&self) -> Option<&WeekSummary> {
        self.weeks.iter().find(|w| w.is_current)
    }
}

fn mean_risk_reward<'a, I>(records: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Record>,
{
    let (sum, n) = records
        .into_iter()
        .filter_map(Record::risk_reward)
        .fold((0.0, 0usize), |(sum, n), rr| (sum + rr, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Signal-only scopes colour days by PnL sign; anything else by status.
fn outcome_rule(records: &[Record]) -> OutcomeRule {
    let signal_only =
        !records.is_empty() && records.iter().all(|r| r.kind == RecordKind::Signal);
    if signal_only {
        OutcomeRule::for_kind(RecordKind::Signal)
    } else {
        OutcomeRule::for_kind(RecordKind::Trade)
    }
}

/// Build a report for every scope that has records or a configured account.
pub fn build_reports(
    groups: &BTreeMap<Scope, Vec<Record>>,
    config: &ReportConfig,
    request: &ReportRequest,
) -> Vec<MonthReport> {
    let scopes: Vec<&Scope> = groups
        .keys()
        .chain(config.scopes())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    for scope in &scopes {
        if config.account(scope).is_none() {
            tracing::warn!(scope = %scope, "no account configured, using a zero baseline");
        }
    }

    let reports: Vec<MonthReport> = scopes
        .par_iter()
        .map(|&scope| {
            let records = groups.get(scope).map(Vec::as_slice).unwrap_or(&[]);
            MonthReport::build(scope, records, config, request)
        })
        .collect();

    tracing::info!(
        month = %request.month,
        scopes = reports.len(),
        "built month reports"
    );
    reports
}

/// Report for a single named scope.
pub fn build_scope_report(
    groups: &BTreeMap<Scope, Vec<Record>>,
    scope: &Scope,
    config: &ReportConfig,
    request: &ReportRequest,
) -> Result<MonthReport, ReportError> {
    let records = match groups.get(scope) {
        Some(records) => records.as_slice(),
        None if config.account(scope).is_some() => &[],
        None => return Err(ReportError::UnknownScope(scope.to_string())),
    };
    if config.account(scope).is_none() {
        tracing::warn!(scope = %scope, "no account configured, using a zero baseline");
    }
    Ok(MonthReport::build(scope, records, config, request))
}

/// A report run driven from files on disk.
#[derive(Debug, Clone, Copy)]
pub struct ReportJob<'a> {
    pub records: &'a Path,
    pub config: Option<&'a Path>,
    /// Month as `YYYY-MM`.
    pub month: &'a str,
    /// Only this scope; every scope when `None`.
    pub scope: Option<&'a str>,
    /// Reference day; `None` takes the day of `now` in the configured offset.
    pub today: Option<NaiveDate>,
}

/// Load the config and the snapshot named by `job`, then build its reports.
pub fn generate_reports(
    job: &ReportJob<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<MonthReport>, ReportError> {
    let config = ReportConfig::load(job.config)?;
    let month = MonthKey::parse(job.month)?;
    let today = job
        .today
        .unwrap_or_else(|| now.with_timezone(&config.offset()).date_naive());
    let request = ReportRequest::new(month, today, config.offset());
    let groups = group_by_scope(load_records(job.records)?);

    match job.scope {
        Some(name) => {
            let report = build_scope_report(&groups, &Scope::new(name), &config, &request)?;
            Ok(vec![report])
        }
        None => Ok(build_reports(&groups, &config, &request)),
    }
}
