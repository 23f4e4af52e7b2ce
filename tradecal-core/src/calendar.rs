//! Calendar bucketer — day keys and calendar-row weeks.
//!
//! Weeks here are the rows of a 7-column, Monday-first month grid, not ISO
//! weeks. For a month whose first day sits in column `o` (Monday = 0) with
//! `n` days:
//! - the grid has `ceil((o + n) / 7)` rows;
//! - day `d` lives in row `(d - 1 + o) / 7 + 1`.
//!
//! Partial first and last rows are real rows; their blank cells carry no day.

use crate::domain::RawTimestamp;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A `(year, month, day)` calendar day in local time.
pub type DayKey = NaiveDate;

/// Errors from validating calendar inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("invalid month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("cannot parse month '{0}' (expected YYYY-MM)")]
    Unparsable(String),
}

// ─── MonthKey ───────────────────────────────────────────────────────

/// A validated calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    month: u32,
    first: NaiveDate,
    last: NaiveDate,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, CalendarError> {
        let invalid = CalendarError::InvalidMonth { year, month };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid.clone())?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let last = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|next| next.pred_opt())
            .ok_or(invalid)?;
        Ok(Self {
            year,
            month,
            first,
            last,
        })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let last = first
            .checked_add_months(chrono::Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(date);
        Self {
            year: date.year(),
            month: date.month(),
            first,
            last,
        }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(text: &str) -> Result<Self, CalendarError> {
        let unparsable = || CalendarError::Unparsable(text.to_string());
        let (y, m) = text.trim().split_once('-').ok_or_else(unparsable)?;
        let year: i32 = y.parse().map_err(|_| unparsable())?;
        let month: u32 = m.parse().map_err(|_| unparsable())?;
        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last
    }

    pub fn days_in_month(&self) -> u32 {
        self.last.day()
    }

    /// Column of day 1 in a Monday-first grid (Monday = 0, Sunday = 6).
    pub fn first_weekday_offset(&self) -> u32 {
        self.first.weekday().num_days_from_monday()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }

    /// Date of day number `day`, if it exists in this month.
    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    /// Every date of the month, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let count = self.days_in_month() as usize;
        self.first.iter_days().take(count)
    }

    pub fn succ(&self) -> Option<Self> {
        self.last.succ_opt().map(Self::of)
    }

    pub fn pred(&self) -> Option<Self> {
        self.first.pred_opt().map(Self::of)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = CalendarError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(month: MonthKey) -> Self {
        month.to_string()
    }
}

// ─── Row weeks ──────────────────────────────────────────────────────

/// One row of the month grid with the day numbers it displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowWeek {
    /// 1-based row index.
    pub row: u32,
    pub days: Vec<u32>,
}

/// Number of rows the month occupies in a Monday-first grid.
pub fn row_count(month: MonthKey) -> u32 {
    (month.first_weekday_offset() + month.days_in_month()).div_ceil(7)
}

/// Partition `1..=days_in_month` into grid rows.
pub fn row_weeks_for_month(month: MonthKey) -> Vec<RowWeek> {
    let mut rows: Vec<RowWeek> = (1..=row_count(month))
        .map(|row| RowWeek {
            row,
            days: Vec::with_capacity(7),
        })
        .collect();

    for day in 1..=month.days_in_month() {
        if let Some(row) = assign_row(month, day) {
            rows[(row - 1) as usize].days.push(day);
        }
    }
    rows
}

/// Row index of `day` without materializing the month. `None` if out of range.
pub fn assign_row(month: MonthKey, day: u32) -> Option<u32> {
    if day == 0 || day > month.days_in_month() {
        return None;
    }
    Some((day - 1 + month.first_weekday_offset()) / 7 + 1)
}

/// Row of `today` when it falls inside `month`.
pub fn current_row(month: MonthKey, today: NaiveDate) -> Option<u32> {
    if !month.contains(today) {
        return None;
    }
    assign_row(month, today.day())
}

// ─── Grid ───────────────────────────────────────────────────────────

/// A single cell of the Monday-first month grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    /// Day number, `None` for blank leading/trailing cells.
    pub day: Option<u32>,
    pub row: u32,
    /// 0 = Monday … 6 = Sunday.
    pub column: u32,
    pub is_today: bool,
}

/// All `row_count * 7` cells of the month grid, row-major.
pub fn month_grid(month: MonthKey, today: Option<NaiveDate>) -> Vec<GridCell> {
    let offset = month.first_weekday_offset();
    let days = month.days_in_month();
    let total = row_count(month) * 7;
    let today_day = today.filter(|t| month.contains(*t)).map(|t| t.day());

    (0..total)
        .map(|i| {
            let candidate = i as i64 - offset as i64 + 1;
            let day = (candidate >= 1 && candidate <= days as i64).then_some(candidate as u32);
            GridCell {
                day,
                row: i / 7 + 1,
                column: i % 7,
                is_today: day.is_some() && day == today_day,
            }
        })
        .collect()
}

// ─── Day keys ───────────────────────────────────────────────────────

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Local calendar day of a timestamp, `None` if it is not a real date.
///
/// Instants (epoch millis, RFC 3339) are shifted into `offset`; naive
/// date-times and bare dates are taken as already local. An instant whose
/// local time falls outside the representable range has no day.
pub fn day_key(timestamp: &RawTimestamp, offset: FixedOffset) -> Option<DayKey> {
    match timestamp {
        RawTimestamp::Millis(millis) => from_millis(*millis, offset),
        RawTimestamp::Fractional(millis) => from_fractional_millis(*millis, offset),
        RawTimestamp::Text(text) => parse_text(text.trim(), offset),
        RawTimestamp::Missing => None,
    }
}

fn from_millis(millis: i64, offset: FixedOffset) -> Option<DayKey> {
    let utc = DateTime::from_timestamp_millis(millis)?;
    to_local_day(utc.naive_utc(), offset)
}

fn from_fractional_millis(millis: f64, offset: FixedOffset) -> Option<DayKey> {
    if !millis.is_finite() {
        return None;
    }
    from_millis(millis.trunc() as i64, offset)
}

/// Shift a UTC wall time by `offset` without panicking at the range edges.
fn to_local_day(utc: NaiveDateTime, offset: FixedOffset) -> Option<DayKey> {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    utc.checked_add_signed(shift).map(|local| local.date())
}

fn parse_text(text: &str, offset: FixedOffset) -> Option<DayKey> {
    if text.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return to_local_day(instant.naive_utc(), offset);
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(local.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    text.parse::<i64>()
        .ok()
        .and_then(|millis| from_millis(millis, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> MonthKey {
        MonthKey::new(y, m).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ── MonthKey ──

    #[test]
    fn month_key_validation() {
        assert!(MonthKey::new(2024, 0).is_err());
        assert!(MonthKey::new(2024, 13).is_err());
        assert_eq!(month(2024, 2).days_in_month(), 29);
        assert_eq!(month(2023, 2).days_in_month(), 28);
        assert_eq!(month(2024, 12).last_day(), d(2024, 12, 31));
    }

    #[test]
    fn month_key_parse_and_display() {
        let m = MonthKey::parse("2024-03").unwrap();
        assert_eq!(m, month(2024, 3));
        assert_eq!(m.to_string(), "2024-03");
        assert!(MonthKey::parse("March").is_err());
        assert!(MonthKey::parse("2024-3x").is_err());
        assert_eq!(
            MonthKey::parse("2024-14"),
            Err(CalendarError::InvalidMonth {
                year: 2024,
                month: 14
            })
        );
    }

    #[test]
    fn month_key_serde_as_string() {
        let json = serde_json::to_string(&month(2024, 3)).unwrap();
        assert_eq!(json, "\"2024-03\"");
        let back: MonthKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month(2024, 3));
    }

    #[test]
    fn month_navigation() {
        assert_eq!(month(2024, 12).succ(), Some(month(2025, 1)));
        assert_eq!(month(2024, 1).pred(), Some(month(2023, 12)));
        assert_eq!(MonthKey::of(d(2024, 2, 17)), month(2024, 2));
    }

    // ── Row weeks ──

    #[test]
    fn march_2024_starts_on_friday() {
        // 2024-03-01 is a Friday → offset 4, 31 days → 5 rows
        let m = month(2024, 3);
        assert_eq!(m.first_weekday_offset(), 4);
        let rows = row_weeks_for_month(m);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].days, vec![1, 2, 3]);
        assert_eq!(rows[1].days, (4..=10).collect::<Vec<_>>());
        assert_eq!(rows[4].days, (25..=31).collect::<Vec<_>>());
    }

    #[test]
    fn sunday_start_needs_six_rows() {
        // 2024-09-01 is a Sunday → offset 6, 30 days → ceil(36/7) = 6 rows
        let m = month(2024, 9);
        assert_eq!(m.first_weekday_offset(), 6);
        let rows = row_weeks_for_month(m);
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].days, vec![1]);
        assert_eq!(rows[5].days, vec![30]);
    }

    #[test]
    fn february_on_monday_fills_four_rows() {
        // 2021-02-01 is a Monday, 28 days → exactly 4 full rows
        let rows = row_weeks_for_month(month(2021, 2));
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.days.len() == 7));
    }

    #[test]
    fn assign_row_matches_partition() {
        let m = month(2024, 3);
        assert_eq!(assign_row(m, 1), Some(1));
        assert_eq!(assign_row(m, 3), Some(1));
        assert_eq!(assign_row(m, 4), Some(2));
        assert_eq!(assign_row(m, 31), Some(5));
        assert_eq!(assign_row(m, 0), None);
        assert_eq!(assign_row(m, 32), None);
    }

    #[test]
    fn current_row_only_inside_month() {
        let m = month(2024, 3);
        assert_eq!(current_row(m, d(2024, 3, 11)), Some(3));
        assert_eq!(current_row(m, d(2024, 4, 1)), None);
    }

    // ── Grid ──

    #[test]
    fn grid_has_blank_leading_and_trailing_cells() {
        let cells = month_grid(month(2024, 3), Some(d(2024, 3, 4)));
        assert_eq!(cells.len(), 35);
        assert!(cells[..4].iter().all(|c| c.day.is_none()));
        assert_eq!(cells[4].day, Some(1));
        assert_eq!(cells[4].column, 4);
        assert_eq!(cells[34].day, Some(31));
        let today: Vec<_> = cells.iter().filter(|c| c.is_today).collect();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].day, Some(4));
        assert_eq!(today[0].row, 2);
    }

    #[test]
    fn grid_today_outside_month_marks_nothing() {
        let cells = month_grid(month(2024, 3), Some(d(2024, 2, 4)));
        assert!(cells.iter().all(|c| !c.is_today));
    }

    // ── Day keys ──

    #[test]
    fn day_key_from_millis_respects_offset() {
        // 2024-03-01T23:30:00Z
        let ts = RawTimestamp::Millis(1_709_335_800_000);
        let utc = FixedOffset::east_opt(0).unwrap();
        let paris = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(day_key(&ts, utc), Some(d(2024, 3, 1)));
        assert_eq!(day_key(&ts, paris), Some(d(2024, 3, 2)));
    }

    #[test]
    fn day_key_from_text_forms() {
        let utc = FixedOffset::east_opt(0).unwrap();
        for text in [
            "2024-03-05",
            "2024-03-05T09:15:00",
            "2024-03-05 09:15",
            "2024-03-05T09:15:00.000Z",
            "2024-03-05T09:15:00+02:00",
        ] {
            assert_eq!(day_key(&text.into(), utc), Some(d(2024, 3, 5)), "{text}");
        }
    }

    #[test]
    fn day_key_at_the_edges_of_the_range_is_none() {
        let east = FixedOffset::east_opt(14 * 3600).unwrap();
        let west = FixedOffset::west_opt(14 * 3600).unwrap();
        let max = NaiveDateTime::MAX.and_utc().timestamp_millis();
        let min = NaiveDateTime::MIN.and_utc().timestamp_millis();

        assert_eq!(day_key(&RawTimestamp::Millis(max), east), None);
        assert_eq!(day_key(&RawTimestamp::Millis(min), west), None);
        assert_eq!(day_key(&max.to_string().as_str().into(), east), None);
        assert_eq!(day_key(&RawTimestamp::Millis(i64::MAX), east), None);

        // The same instants stay valid where the shift keeps them in range.
        assert!(day_key(&RawTimestamp::Millis(max), west).is_some());
        assert!(day_key(&RawTimestamp::Millis(min), east).is_some());
    }

    #[test]
    fn day_key_from_fractional_and_missing() {
        let utc = FixedOffset::east_opt(0).unwrap();
        // 2024-03-01T11:00:00.000Z, sub-millisecond part dropped
        let ts = RawTimestamp::Fractional(1_709_290_800_000.7);
        assert_eq!(day_key(&ts, utc), Some(d(2024, 3, 1)));
        assert_eq!(day_key(&RawTimestamp::Fractional(f64::NAN), utc), None);
        assert_eq!(day_key(&RawTimestamp::Missing, utc), None);
    }

    #[test]
    fn day_key_rejects_impossible_dates() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(day_key(&"2024-02-30".into(), utc), None);
        assert_eq!(day_key(&"14:32".into(), utc), None);
        assert_eq!(day_key(&"".into(), utc), None);
    }
}
