//! Reporting and export — JSON, CSV, Markdown and plain-text calendar output.
//!
//! - **JSON**: full month report with `schema_version`; unknown versions are
//!   rejected on import
//! - **CSV**: equity curve and weekly breakdown for spreadsheets
//! - **Markdown**: human-readable month summary
//! - **Text**: the Monday-first month grid for terminals

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tradecal_core::aggregate::{DayOutcome, Stats};
use tradecal_core::calendar::{month_grid, MonthKey};
use tradecal_core::equity::{change_points, EquityPoint};

use crate::report::{DaySummary, LossSummary, MonthReport, WeekSummary, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `MonthReport` to pretty JSON.
pub fn export_json(report: &MonthReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize MonthReport to JSON")
}

/// Serialize several reports as a JSON array.
pub fn export_reports_json(reports: &[MonthReport]) -> Result<String> {
    serde_json::to_string_pretty(reports).context("failed to serialize reports to JSON")
}

/// Deserialize a `MonthReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<MonthReport> {
    let report: MonthReport =
        serde_json::from_str(json).context("failed to deserialize MonthReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a daily equity curve as CSV with date and balance columns.
///
/// With `compact`, only the change points are written.
pub fn export_curve_csv(curve: &[EquityPoint], compact: bool) -> Result<String> {
    let points = if compact {
        change_points(curve)
    } else {
        curve.to_vec()
    };
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "balance"])?;
    for p in &points {
        wtr.write_record([&p.date.to_string(), &format!("{:.2}", p.balance)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the weekly breakdown as CSV.
///
/// Columns: row, first_day, last_day, count, active, wins, losses,
/// break_evens, win_rate, pnl_total, profit_factor, is_current
pub fn export_weeks_csv(weeks: &[WeekSummary]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "row",
        "first_day",
        "last_day",
        "count",
        "active",
        "wins",
        "losses",
        "break_evens",
        "win_rate",
        "pnl_total",
        "profit_factor",
        "is_current",
    ])?;
    for w in weeks {
        let s = &w.stats;
        wtr.write_record([
            &w.row.to_string(),
            &w.days.first().map(u32::to_string).unwrap_or_default(),
            &w.days.last().map(u32::to_string).unwrap_or_default(),
            &s.count.to_string(),
            &w.active.to_string(),
            &s.wins.to_string(),
            &s.losses.to_string(),
            &s.break_evens.to_string(),
            &s.win_rate.to_string(),
            &format!("{:.2}", s.pnl_total),
            &profit_factor_cell(s),
            &w.is_current.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn profit_factor_cell(stats: &Stats) -> String {
    if stats.profit_factor.is_infinite() {
        "INFINITE".to_string()
    } else {
        format!("{:.2}", stats.profit_factor.value())
    }
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one month report.
///
/// Creates `{scope}_{month}/` under `output_dir` containing:
/// - `report.json`: the full `MonthReport`
/// - `curve.csv`: daily equity curve
/// - `weeks.csv`: calendar-row breakdown
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &MonthReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("{}_{}", sanitize(report.scope.as_str()), report.month);
    let dir = output_dir.join(dirname);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    std::fs::write(dir.join("report.json"), export_json(report)?)?;
    std::fs::write(dir.join("curve.csv"), export_curve_csv(&report.curve, false)?)?;
    std::fs::write(dir.join("weeks.csv"), export_weeks_csv(&report.weeks)?)?;
    std::fs::write(dir.join("report.md"), generate_markdown(report))?;

    tracing::info!(dir = %dir.display(), "saved report artifacts");
    Ok(dir)
}

/// Load a `MonthReport` from an artifact directory's report.json.
pub fn load_artifacts(dir: &Path) -> Result<MonthReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown summary for one month report.
pub fn generate_markdown(report: &MonthReport) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str(&format!("# {} · {}\n\n", report.scope, report.month));

    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Month | All time |\n");
    md.push_str("| --- | --- | --- |\n");
    let (m, a) = (&report.month_stats, &report.all_time_stats);
    md.push_str(&format!("| Trades | {} | {} |\n", m.count, a.count));
    md.push_str(&format!("| PnL | {:+.2} | {:+.2} |\n", m.pnl_total, a.pnl_total));
    md.push_str(&format!(
        "| W / L / BE | {} / {} / {} | {} / {} / {} |\n",
        m.wins, m.losses, m.break_evens, a.wins, a.losses, a.break_evens
    ));
    md.push_str(&format!("| Win Rate | {}% | {}% |\n", m.win_rate, a.win_rate));
    md.push_str(&format!(
        "| Profit Factor | {} | {} |\n",
        m.profit_factor, a.profit_factor
    ));
    md.push_str(&format!("| Avg Win | {:.0} | {:.0} |\n", m.avg_win, a.avg_win));
    md.push_str(&format!("| Avg Loss | {:.0} | {:.0} |\n", m.avg_loss, a.avg_loss));
    md.push('\n');
    if let Some(rr) = report.avg_risk_reward {
        md.push_str(&format!("Average R:R: {rr:.2}\n\n"));
    }

    md.push_str("## Today\n\n");
    md.push_str(&format!(
        "{}: {} closed, {:+.2} PnL, {} open\n\n",
        report.today.date,
        report.today.stats.count,
        report.today.stats.pnl_total,
        report.today.active
    ));

    md.push_str("## Weeks\n\n");
    md.push_str("| Week | Days | Trades | Win Rate | PnL |\n");
    md.push_str("| --- | --- | --- | --- | --- |\n");
    for w in &report.weeks {
        let marker = if w.is_current { " (current)" } else { "" };
        md.push_str(&format!(
            "| {}{} | {} | {} | {}% | {:+.2} |\n",
            w.row,
            marker,
            day_range(&w.days),
            w.stats.count,
            w.stats.win_rate,
            w.stats.pnl_total
        ));
    }
    md.push('\n');

    md.push_str("## Equity\n\n");
    if let (Some(first), Some(last)) = (report.curve.first(), report.curve.last()) {
        md.push_str(&format!(
            "Opening {:.2}, closing {:.2}\n\n",
            first.balance, last.balance
        ));
    }
    match report.max_drawdown {
        Some(dd) => md.push_str(&format!("Max drawdown: {dd:.2}\n\n")),
        None => md.push_str("Max drawdown: none\n\n"),
    }
    if let Some(stop) = &report.stop {
        md.push_str("| Stop | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Floor | {:.2} |\n", stop.stop_floor));
        md.push_str(&format!("| Trailing Stop | {:.2} |\n", stop.trailing_stop));
        md.push_str(&format!("| Balance | {:.2} |\n", stop.current_balance));
        md.push_str(&format!("| Remaining | {:.2} |\n", stop.remaining));
        if stop.is_at_risk {
            md.push_str("| Status | **AT RISK** |\n");
        }
        md.push('\n');
    }

    md.push_str(&format_losses(&report.losses));
    md
}

fn format_losses(losses: &LossSummary) -> String {
    let mut md = String::from("## Losses\n\n");
    if losses.total_losses == 0 {
        md.push_str("No losing trades.\n");
        return md;
    }
    md.push_str(&format!(
        "{} losses, {:.2} total\n\n",
        losses.total_losses, losses.total_loss_pnl
    ));
    md.push_str("| Reason | Count | Share | Total | Avg |\n");
    md.push_str("| --- | --- | --- | --- | --- |\n");
    for r in &losses.reasons {
        let name = match &r.emoji {
            Some(emoji) => format!("{emoji} {}", r.label),
            None => r.label.clone(),
        };
        md.push_str(&format!(
            "| {} | {} | {}% | {:.2} | {:.2} |\n",
            name, r.share.count, r.share.percentage, r.share.total_pnl, r.share.avg_pnl
        ));
    }
    if losses.unspecified > 0 {
        md.push_str(&format!(
            "| {} | {} | | | |\n",
            tradecal_core::losses::UNSPECIFIED_REASON,
            losses.unspecified
        ));
    }
    md
}

fn day_range(days: &[u32]) -> String {
    match (days.first(), days.last()) {
        (Some(a), Some(b)) if a == b => a.to_string(),
        (Some(a), Some(b)) => format!("{a}–{b}"),
        _ => String::new(),
    }
}

// ─── Text calendar ──────────────────────────────────────────────────

/// Render the month grid for a terminal, Monday first.
///
/// With day summaries, each traded day carries an outcome marker:
/// `+` win, `-` loss, `~` mixed. Today is bracketed.
pub fn render_calendar(month: MonthKey, today: Option<NaiveDate>, days: &[DaySummary]) -> String {
    let mut out = format!("{:^35}\n", month.to_string());
    out.push_str("  Mo   Tu   We   Th   Fr   Sa   Su\n");

    for row in month_grid(month, today).chunks(7) {
        for cell in row {
            let text = match cell.day {
                Some(day) => {
                    let marker = days
                        .iter()
                        .find(|d| month.date(day) == Some(d.date))
                        .map_or(' ', |d| outcome_marker(d.outcome));
                    if cell.is_today {
                        format!("[{day:>2}]{marker}")
                    } else {
                        format!(" {day:>2} {marker}")
                    }
                }
                None => "     ".to_string(),
            };
            out.push_str(&text);
        }
        out.push('\n');
    }
    out
}

fn outcome_marker(outcome: DayOutcome) -> char {
    match outcome {
        DayOutcome::None => ' ',
        DayOutcome::Win => '+',
        DayOutcome::Loss => '-',
        DayOutcome::Mixed => '~',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn curve_csv_full_and_compact() {
        let curve = vec![
            EquityPoint { date: d(1), balance: 100.0 },
            EquityPoint { date: d(2), balance: 100.0 },
            EquityPoint { date: d(3), balance: 90.5 },
            EquityPoint { date: d(4), balance: 90.5 },
        ];
        let full = export_curve_csv(&curve, false).unwrap();
        assert_eq!(full.lines().count(), 5);
        assert!(full.starts_with("date,balance\n2024-03-01,100.00\n"));

        let compact = export_curve_csv(&curve, true).unwrap();
        let lines: Vec<_> = compact.lines().collect();
        assert_eq!(
            lines,
            vec!["date,balance", "2024-03-01,100.00", "2024-03-03,90.50", "2024-03-04,90.50"]
        );
    }

    #[test]
    fn weeks_csv_marks_infinite_profit_factor() {
        let weeks = vec![WeekSummary {
            row: 1,
            days: vec![1, 2, 3],
            stats: Stats {
                count: 1,
                wins: 1,
                pnl_total: 10.0,
                win_rate: 100,
                profit_factor: tradecal_core::ProfitFactor::Infinite,
                avg_win: 10.0,
                ..Stats::default()
            },
            active: 2,
            is_current: true,
        }];
        let csv = export_weeks_csv(&weeks).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(row, "1,1,3,1,2,1,0,0,100,10.00,INFINITE,true");
    }

    #[test]
    fn calendar_text_layout() {
        let month = MonthKey::new(2024, 3).unwrap();
        let text = render_calendar(month, Some(d(5)), &[]);
        let lines: Vec<_> = text.lines().collect();
        // Title, header, five grid rows.
        assert_eq!(lines.len(), 7);
        assert!(lines[2].starts_with("                    "));
        assert!(lines[2].contains("  1 "));
        assert!(lines[3].contains("[ 5]"));
    }

    #[test]
    fn day_range_formats() {
        assert_eq!(day_range(&[1, 2, 3]), "1–3");
        assert_eq!(day_range(&[31]), "31");
        assert_eq!(day_range(&[]), "");
    }
}
