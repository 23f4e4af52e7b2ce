//! TradeCal Core — calendar aggregation of a trading journal.
//!
//! Pure, synchronous computations over records supplied by the caller:
//! - PnL parsing of loosely formatted amounts
//! - Day keys and calendar-row weeks (Monday-first month grid)
//! - Period statistics (win rate, profit factor, averages)
//! - Daily equity curve with carry-forward
//! - Trailing stop and drawdown
//! - Loss-reason breakdown

pub mod aggregate;
pub mod calendar;
pub mod domain;
pub mod equity;
pub mod losses;
pub mod pnl;
pub mod risk;

pub use aggregate::{
    aggregate, aggregate_period, count_active, day_outcome, DayOutcome, OutcomeRule, Period,
    ProfitFactor, Stats, StatsAccumulator,
};
pub use calendar::{
    assign_row, current_row, day_key, month_grid, row_weeks_for_month, CalendarError, DayKey,
    GridCell, MonthKey, RowWeek,
};
pub use domain::{AccountBaseline, Record, RecordKind, Scope, Status};
pub use equity::{build_curve, change_points, daily_pnl_totals, EquityPoint};
pub use losses::{analyze_losses, LossBreakdown, ReasonShare};
pub use pnl::parse_pnl;
pub use risk::{max_drawdown, month_max_drawdown, trailing_stop, worst_drawdown, StopStatus};
