//! Period aggregator — counts, PnL, win rate, profit factor, averages.
//!
//! One aggregation routine serves every scope (day, calendar-row week, month,
//! full history); only the record predicate changes. Every statistic has a
//! defined zero value, so an empty selection never fails.

use crate::calendar::{assign_row, DayKey, MonthKey};
use crate::domain::{Record, RecordKind, Status};
use chrono::{Datelike, FixedOffset};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gross losses below this are treated as zero.
const ZERO_LOSS_EPSILON: f64 = 1e-10;

// ─── Profit factor ──────────────────────────────────────────────────

/// Gross winning PnL over gross absolute losing PnL.
///
/// Serialized as a number, or the string `"INFINITE"` when there are gains but
/// no losses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitFactor {
    Finite(f64),
    Infinite,
}

impl ProfitFactor {
    pub fn value(self) -> f64 {
        match self {
            ProfitFactor::Finite(v) => v,
            ProfitFactor::Infinite => f64::INFINITY,
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, ProfitFactor::Infinite)
    }
}

impl Default for ProfitFactor {
    fn default() -> Self {
        ProfitFactor::Finite(0.0)
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{v:.2}"),
            ProfitFactor::Infinite => write!(f, "∞"),
        }
    }
}

impl Serialize for ProfitFactor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProfitFactor::Finite(v) => serializer.serialize_f64(*v),
            ProfitFactor::Infinite => serializer.serialize_str("INFINITE"),
        }
    }
}

impl<'de> Deserialize<'de> for ProfitFactor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(ProfitFactor::Finite(v)),
            Repr::Text(t) if t == "INFINITE" => Ok(ProfitFactor::Infinite),
            Repr::Text(t) => Err(de::Error::custom(format!("invalid profit factor '{t}'"))),
        }
    }
}

// ─── Stats ──────────────────────────────────────────────────────────

/// Aggregate statistics for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Terminal records selected.
    pub count: usize,
    pub pnl_total: f64,
    pub wins: usize,
    pub losses: usize,
    pub break_evens: usize,
    /// Percent of decided records that won, 0–100. Break-evens are not decided.
    pub win_rate: u32,
    pub profit_factor: ProfitFactor,
    /// Mean winning PnL, rounded to a whole currency unit.
    pub avg_win: f64,
    /// Mean absolute losing PnL, rounded to a whole currency unit.
    pub avg_loss: f64,
}

impl Stats {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Streaming accumulator behind [`aggregate`].
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    count: usize,
    pnl_total: f64,
    wins: usize,
    losses: usize,
    break_evens: usize,
    gross_win: f64,
    gross_loss: f64,
    priced_wins: usize,
    priced_losses: usize,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record in. Active records are ignored.
    pub fn push(&mut self, record: &Record) {
        if !record.is_terminal() {
            return;
        }
        self.count += 1;
        let pnl = record.pnl_value();
        if let Some(v) = pnl {
            self.pnl_total += v;
        }

        match record.status {
            Status::Win => {
                self.wins += 1;
                if let Some(v) = pnl {
                    self.gross_win += v;
                    self.priced_wins += 1;
                }
            }
            Status::Loss => {
                self.losses += 1;
                if let Some(v) = pnl {
                    self.gross_loss += v.abs();
                    self.priced_losses += 1;
                }
            }
            Status::BreakEven => self.break_evens += 1,
            Status::Active => {}
        }
    }

    pub fn finish(&self) -> Stats {
        Stats {
            count: self.count,
            pnl_total: self.pnl_total,
            wins: self.wins,
            losses: self.losses,
            break_evens: self.break_evens,
            win_rate: win_rate(self.wins, self.losses),
            profit_factor: profit_factor(self.gross_win, self.gross_loss),
            avg_win: rounded_mean(self.gross_win, self.priced_wins),
            avg_loss: rounded_mean(self.gross_loss, self.priced_losses),
        }
    }
}

/// Aggregate the records selected by `predicate`.
pub fn aggregate<'a, I, P>(records: I, predicate: P) -> Stats
where
    I: IntoIterator<Item = &'a Record>,
    P: Fn(&Record) -> bool,
{
    let mut acc = StatsAccumulator::new();
    for record in records {
        if predicate(record) {
            acc.push(record);
        }
    }
    acc.finish()
}

/// Number of open (`Active`) records selected by `predicate`.
pub fn count_active<'a, I, P>(records: I, predicate: P) -> usize
where
    I: IntoIterator<Item = &'a Record>,
    P: Fn(&Record) -> bool,
{
    records
        .into_iter()
        .filter(|r| r.status == Status::Active && predicate(*r))
        .count()
}

// ─── Periods ────────────────────────────────────────────────────────

/// A time scope to aggregate over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Period {
    Day { date: DayKey },
    RowWeek { month: MonthKey, row: u32 },
    Month { month: MonthKey },
    AllTime,
}

impl Period {
    /// Whether `record` falls in this period.
    ///
    /// Records with invalid timestamps only ever match `AllTime`.
    pub fn contains(&self, record: &Record, offset: FixedOffset) -> bool {
        if let Period::AllTime = self {
            return true;
        }
        let Some(date) = record.day_key(offset) else {
            return false;
        };
        match self {
            Period::Day { date: day } => date == *day,
            Period::RowWeek { month, row } => {
                month.contains(date) && assign_row(*month, date.day()) == Some(*row)
            }
            Period::Month { month } => month.contains(date),
            Period::AllTime => true,
        }
    }

    pub fn predicate(self, offset: FixedOffset) -> impl Fn(&Record) -> bool {
        move |record: &Record| self.contains(record, offset)
    }
}

/// Aggregate a whole period.
pub fn aggregate_period(records: &[Record], period: Period, offset: FixedOffset) -> Stats {
    aggregate(records, period.predicate(offset))
}

// ─── Day outcome ────────────────────────────────────────────────────

/// How a calendar day reads at a glance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOutcome {
    #[default]
    None,
    Win,
    Loss,
    Mixed,
}

/// Which evidence classifies a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeRule {
    /// Status mix of terminal records (journal trades).
    ByStatus,
    /// Sign of the day's PnL (published signals).
    ByPnl,
}

impl OutcomeRule {
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Trade => OutcomeRule::ByStatus,
            RecordKind::Signal => OutcomeRule::ByPnl,
        }
    }
}

/// Classify one day's records.
///
/// Under `ByPnl` every priced record counts, open ones included.
pub fn day_outcome<'a, I>(records: I, rule: OutcomeRule) -> DayOutcome
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut any = false;
    let (mut has_win, mut has_loss, mut has_be) = (false, false, false);
    let mut pnl = 0.0;

    for record in records {
        any = true;
        match record.status {
            Status::Win => has_win = true,
            Status::Loss => has_loss = true,
            Status::BreakEven => has_be = true,
            Status::Active => {}
        }
        pnl += record.pnl_value().unwrap_or(0.0);
    }

    match rule {
        OutcomeRule::ByStatus => {
            if has_win && !has_loss {
                DayOutcome::Win
            } else if has_loss && !has_win {
                DayOutcome::Loss
            } else if has_be || (has_win && has_loss) {
                DayOutcome::Mixed
            } else {
                DayOutcome::None
            }
        }
        OutcomeRule::ByPnl => {
            if !any {
                DayOutcome::None
            } else if pnl > 0.0 {
                DayOutcome::Win
            } else if pnl < 0.0 {
                DayOutcome::Loss
            } else {
                DayOutcome::Mixed
            }
        }
    }
}

// ─── Individual statistic functions ─────────────────────────────────

/// `round(wins / (wins + losses) * 100)`, zero when nothing was decided.
pub fn win_rate(wins: usize, losses: usize) -> u32 {
    let decided = wins + losses;
    if decided == 0 {
        return 0;
    }
    round_half_up(wins as f64 / decided as f64 * 100.0) as u32
}

/// Profit factor with the zero-loss sentinel.
pub fn profit_factor(gross_win: f64, gross_loss: f64) -> ProfitFactor {
    if gross_loss < ZERO_LOSS_EPSILON {
        return if gross_win > 0.0 {
            ProfitFactor::Infinite
        } else {
            ProfitFactor::Finite(0.0)
        };
    }
    ProfitFactor::Finite(gross_win / gross_loss)
}

/// Round half toward positive infinity (`2.5 → 3`, `-2.5 → -2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn rounded_mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    round_half_up(sum / n as f64)
}
