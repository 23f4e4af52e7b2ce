//! TradeCal CLI — calendar reports over a trading journal snapshot.
//!
//! Commands:
//! - `report` — full month report per scope (JSON or Markdown, optional artifacts)
//! - `calendar` — print the Monday-first month grid
//! - `losses` — loss-reason breakdown
//! - `curve` — daily equity curve for one scope

mod logging;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tradecal_core::calendar::MonthKey;
use tradecal_core::domain::{Record, Scope};
use tradecal_core::equity::build_curve;
use tradecal_report::export::{
    export_curve_csv, export_json, export_reports_json, generate_markdown, render_calendar,
    save_artifacts,
};
use tradecal_report::{
    generate_reports, group_by_scope, load_records, LossSummary, ReportConfig, ReportJob,
};

use crate::logging::{init_logging, LogConfig, LogFormat};

#[derive(Parser)]
#[command(
    name = "tradecal",
    about = "TradeCal CLI — calendar statistics for a trading journal"
)]
struct Cli {
    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the month report for every scope, or one with --scope.
    Report {
        /// Snapshot file (.json or .csv).
        #[arg(long)]
        records: PathBuf,

        /// TOML config with accounts and loss reasons.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Month to report (YYYY-MM).
        #[arg(long)]
        month: String,

        /// Only this scope.
        #[arg(long)]
        scope: Option<String>,

        /// Reference day for "today" and the current week (YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        today: Option<String>,

        /// Output format on stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        /// Write report.json, curve.csv, weeks.csv and report.md per scope here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the month grid, with day outcomes when records are given.
    Calendar {
        /// Month to show (YYYY-MM).
        #[arg(long)]
        month: String,

        /// Day to highlight (YYYY-MM-DD). Defaults to now.
        #[arg(long)]
        today: Option<String>,

        /// Snapshot file for outcome markers.
        #[arg(long)]
        records: Option<PathBuf>,

        /// TOML config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Scope for outcome markers (required with --records).
        #[arg(long)]
        scope: Option<String>,
    },
    /// Loss-reason breakdown per scope.
    Losses {
        /// Snapshot file (.json or .csv).
        #[arg(long)]
        records: PathBuf,

        /// TOML config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only this scope.
        #[arg(long)]
        scope: Option<String>,

        /// Restrict to one month (YYYY-MM). Defaults to all history.
        #[arg(long)]
        month: Option<String>,
    },
    /// Daily equity curve for one scope.
    Curve {
        /// Snapshot file (.json or .csv).
        #[arg(long)]
        records: PathBuf,

        /// TOML config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Month (YYYY-MM).
        #[arg(long)]
        month: String,

        /// Scope to chart.
        #[arg(long)]
        scope: String,

        /// Emit CSV instead of JSON.
        #[arg(long, default_value_t = false)]
        csv: bool,

        /// Keep only the first point, balance changes and the last point.
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::new(&cli.log_level, cli.log_format))?;

    match cli.command {
        Commands::Report {
            records,
            config,
            month,
            scope,
            today,
            format,
            out,
        } => run_report(
            &records,
            config.as_deref(),
            &month,
            scope.as_deref(),
            today.as_deref(),
            format,
            out.as_deref(),
        ),
        Commands::Calendar {
            month,
            today,
            records,
            config,
            scope,
        } => run_calendar(
            &month,
            today.as_deref(),
            records.as_deref(),
            config.as_deref(),
            scope.as_deref(),
        ),
        Commands::Losses {
            records,
            config,
            scope,
            month,
        } => run_losses(&records, config.as_deref(), scope.as_deref(), month.as_deref()),
        Commands::Curve {
            records,
            config,
            month,
            scope,
            csv,
            compact,
        } => run_curve(&records, config.as_deref(), &month, &scope, csv, compact),
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_report(
    records_path: &Path,
    config_path: Option<&Path>,
    month: &str,
    scope: Option<&str>,
    today: Option<&str>,
    format: OutputFormat,
    out: Option<&Path>,
) -> Result<()> {
    let job = ReportJob {
        records: records_path,
        config: config_path,
        month,
        scope,
        today: today.map(parse_day).transpose()?,
    };
    let reports = generate_reports(&job, Utc::now())?;

    if let Some(dir) = out {
        for report in &reports {
            let saved = save_artifacts(report, dir)?;
            eprintln!("Artifacts saved to: {}", saved.display());
        }
    }

    match format {
        OutputFormat::Json if reports.len() == 1 => println!("{}", export_json(&reports[0])?),
        OutputFormat::Json => println!("{}", export_reports_json(&reports)?),
        OutputFormat::Markdown => {
            for report in &reports {
                println!("{}", generate_markdown(report));
            }
        }
    }
    Ok(())
}

fn run_calendar(
    month: &str,
    today: Option<&str>,
    records_path: Option<&Path>,
    config_path: Option<&Path>,
    scope: Option<&str>,
) -> Result<()> {
    let today = today.map(parse_day).transpose()?;

    let (month, today, days) = match (records_path, scope) {
        (Some(path), Some(name)) => {
            let job = ReportJob {
                records: path,
                config: config_path,
                month,
                scope: Some(name),
                today,
            };
            let report = generate_reports(&job, Utc::now())?
                .into_iter()
                .next()
                .context("no report built")?;
            (report.month, report.today.date, report.days)
        }
        (Some(_), None) => bail!("--scope is required with --records"),
        (None, _) => {
            let config = load_config(config_path)?;
            let today = today.unwrap_or_else(|| local_today(&config));
            (parse_month(month)?, today, Vec::new())
        }
    };

    print!("{}", render_calendar(month, Some(today), &days));
    Ok(())
}

fn run_losses(
    records_path: &Path,
    config_path: Option<&Path>,
    scope: Option<&str>,
    month: Option<&str>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let month = month.map(parse_month).transpose()?;
    let groups = group_by_scope(load_records(records_path)?);

    let selected: BTreeMap<&Scope, &Vec<Record>> = match scope {
        Some(name) => {
            let key = Scope::new(name);
            match groups.get_key_value(&key) {
                Some(entry) => BTreeMap::from([entry]),
                None => bail!("no records for scope '{name}'"),
            }
        }
        None => groups.iter().collect(),
    };

    for (scope, records) in selected {
        let in_period = records.iter().filter(|r| match month {
            Some(m) => r.day_key(config.offset()).is_some_and(|d| m.contains(d)),
            None => true,
        });
        let summary = LossSummary::from_records(in_period, config.catalog());
        print_losses(scope, &summary);
    }
    Ok(())
}

fn run_curve(
    records_path: &Path,
    config_path: Option<&Path>,
    month: &str,
    scope: &str,
    csv: bool,
    compact: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let month = parse_month(month)?;
    let scope = Scope::new(scope);
    let groups = group_by_scope(load_records(records_path)?);
    let records = groups.get(&scope).map(Vec::as_slice).unwrap_or(&[]);
    if records.is_empty() && config.account(&scope).is_none() {
        bail!("scope '{scope}' has no records and no configured account");
    }

    let curve = build_curve(records, &config.baseline_for(&scope), month, config.offset());
    if csv {
        print!("{}", export_curve_csv(&curve, compact)?);
    } else {
        let points = if compact {
            tradecal_core::equity::change_points(&curve)
        } else {
            curve
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&points).context("failed to serialize curve")?
        );
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<ReportConfig> {
    ReportConfig::load(path).context("failed to load config")
}

fn parse_month(text: &str) -> Result<MonthKey> {
    Ok(MonthKey::parse(text)?)
}

fn parse_day(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .with_context(|| format!("invalid --today '{text}' (expected YYYY-MM-DD)"))
}

/// The wall-clock day in the configured offset.
fn local_today(config: &ReportConfig) -> NaiveDate {
    Utc::now().with_timezone(&config.offset()).date_naive()
}

fn print_losses(scope: &Scope, summary: &LossSummary) {
    println!("=== {scope} ===");
    println!(
        "Losses: {}  Total: {:.2}  Unspecified: {}",
        summary.total_losses, summary.total_loss_pnl, summary.unspecified
    );
    for r in &summary.reasons {
        let emoji = r.emoji.as_deref().unwrap_or(" ");
        println!(
            "  {emoji} {:<40} {:>4} {:>4}%  total {:>10.2}  avg {:>8.2}",
            r.label, r.share.count, r.share.percentage, r.share.total_pnl, r.share.avg_pnl
        );
    }
    println!();
}
