//! Snapshot files on disk through to exported artifacts.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;
use tradecal_core::calendar::MonthKey;
use tradecal_core::domain::{Record, Scope};
use tradecal_report::export::{
    export_json, generate_markdown, import_json, load_artifacts, render_calendar, save_artifacts,
};
use tradecal_report::{
    build_reports, build_scope_report, generate_reports, group_by_scope, load_records, LoadError,
    MonthReport, ReportConfig, ReportError, ReportJob, ReportRequest,
};

const CONFIG: &str = r#"
utc_offset = "+01:00"

[accounts.main]
initial_balance = 1000.0
stop_floor = 900.0

[[accounts.main.session_drawdowns]]
month = "2024-03"
amount = -75.0
"#;

const JSON: &str = r#"[
    {"id": "1", "scope": "main", "occurredAt": "2024-03-01T09:30:00",
     "status": "WIN", "pnl": "+100"},
    {"id": "2", "scope": "main", "occurredAt": "2024-03-03T10:00:00",
     "status": "LOSS", "pnl": "-40", "lossReasons": ["contre_sma"]},
    {"id": "3", "scope": "main", "occurredAt": "2024-03-03T15:45:00",
     "status": "LOSS", "pnl": "-10", "lossReasons": ["contre_sma"]},
    {"id": "4", "scope": "signals", "kind": "signal", "occurredAt": 1709335800000,
     "status": "WIN", "pnl": 25}
]"#;

const CSV: &str = "\
id,scope,occurred_at,pnl,status,loss_reasons
1,main,2024-03-01T09:30:00,+100,WIN,
2,main,2024-03-03T10:00:00,-40,LOSS,contre_sma
3,main,2024-03-03T15:45:00,-10,LOSS,contre_sma
";

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn main_report(groups: &BTreeMap<Scope, Vec<Record>>, config: &ReportConfig) -> MonthReport {
    build_scope_report(groups, &Scope::new("main"), config, &request(config)).unwrap()
}

fn request(config: &ReportConfig) -> ReportRequest {
    ReportRequest::new(
        MonthKey::new(2024, 3).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        config.offset(),
    )
}

#[test]
fn json_snapshot_to_reports() {
    let tmp = TempDir::new().unwrap();
    let config = ReportConfig::from_file(&write(tmp.path(), "tradecal.toml", CONFIG)).unwrap();
    let records = load_records(&write(tmp.path(), "snapshot.json", JSON)).unwrap();
    assert_eq!(records.len(), 4);

    let groups = group_by_scope(records);
    let reports = build_reports(&groups, &config, &request(&config));
    assert_eq!(reports.len(), 2);

    let main = &reports[0];
    assert_eq!(main.scope.as_str(), "main");
    assert_eq!(main.curve[0].balance, 1_100.0);
    assert_eq!(main.curve[1].balance, 1_100.0);
    assert_eq!(main.curve[2].balance, 1_050.0);
    assert_eq!(main.month_stats.win_rate, 33);
    assert_eq!(main.month_stats.avg_loss, 25.0);
    // Session figure (-75) is worse than the computed -50.
    assert_eq!(main.max_drawdown, Some(-75.0));
    assert_eq!(main.losses.reasons[0].label, "Contre sma");
    assert_eq!(main.losses.reasons[0].share.percentage, 100);
    assert!(main.weeks[1].is_current);

    // 23:30 UTC on Mar 1 lands on Mar 2 at +01:00.
    let signals = &reports[1];
    assert_eq!(signals.days[1].stats.count, 1);
    assert!(signals.stop.is_none());
}

#[test]
fn csv_snapshot_matches_json() {
    let tmp = TempDir::new().unwrap();
    let config = ReportConfig::from_toml(CONFIG).unwrap();
    let records = load_records(&write(tmp.path(), "snapshot.csv", CSV)).unwrap();
    let groups = group_by_scope(records);
    let report = main_report(&groups, &config);
    assert_eq!(report.curve[2].balance, 1_050.0);
    assert_eq!(report.losses.total_losses, 2);
}

// ── Runs from files ──

fn job<'a>(records: &'a Path, config: Option<&'a Path>, month: &'a str) -> ReportJob<'a> {
    ReportJob {
        records,
        config,
        month,
        scope: None,
        today: None,
    }
}

#[test]
fn generate_reports_from_files() {
    let tmp = TempDir::new().unwrap();
    let config = write(tmp.path(), "tradecal.toml", CONFIG);
    let records = write(tmp.path(), "snapshot.json", JSON);
    // 2024-03-04T23:30Z is already Mar 5 at +01:00.
    let now = Utc.with_ymd_and_hms(2024, 3, 4, 23, 30, 0).unwrap();

    let reports = generate_reports(&job(&records, Some(config.as_path()), "2024-03"), now).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].today.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());

    let only_main = ReportJob {
        scope: Some("main"),
        today: NaiveDate::from_ymd_opt(2024, 3, 1),
        ..job(&records, Some(config.as_path()), "2024-03")
    };
    let reports = generate_reports(&only_main, now).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].weeks[0].is_current);
}

#[test]
fn generate_reports_error_kinds() {
    let tmp = TempDir::new().unwrap();
    let config = write(tmp.path(), "tradecal.toml", CONFIG);
    let records = write(tmp.path(), "snapshot.json", JSON);
    let absent = tmp.path().join("absent.toml");
    let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();

    let err = generate_reports(&job(&records, Some(absent.as_path()), "2024-03"), now).unwrap_err();
    assert!(matches!(err, ReportError::Config(_)));

    let err = generate_reports(&job(&records, Some(config.as_path()), "2024-13"), now).unwrap_err();
    assert!(matches!(err, ReportError::Calendar(_)));

    let missing = tmp.path().join("absent.json");
    let err = generate_reports(&job(&missing, Some(config.as_path()), "2024-03"), now).unwrap_err();
    assert!(matches!(err, ReportError::Load(LoadError::Io { .. })));

    let ghost = ReportJob {
        scope: Some("ghost"),
        ..job(&records, Some(config.as_path()), "2024-03")
    };
    let err = generate_reports(&ghost, now).unwrap_err();
    assert!(matches!(err, ReportError::UnknownScope(s) if s == "ghost"));
}

#[test]
fn unknown_extension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "snapshot.txt", "whatever");
    assert!(matches!(load_records(&path), Err(LoadError::UnknownFormat(_))));
}

#[test]
fn missing_file_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = load_records(&tmp.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn malformed_json_is_reported() {
    let tmp = TempDir::new().unwrap();
    let path = write(tmp.path(), "broken.json", "[{\"id\": 1");
    assert!(matches!(load_records(&path), Err(LoadError::Json { .. })));
}

#[test]
fn artifacts_round_trip() {
    let tmp = TempDir::new().unwrap();
    let config = ReportConfig::from_toml(CONFIG).unwrap();
    let records = load_records(&write(tmp.path(), "snapshot.json", JSON)).unwrap();
    let groups = group_by_scope(records);
    let report = main_report(&groups, &config);

    let dir = save_artifacts(&report, tmp.path()).unwrap();
    assert!(dir.ends_with("main_2024-03"));
    for file in ["report.json", "curve.csv", "weeks.csv", "report.md"] {
        assert!(dir.join(file).exists(), "{file} missing");
    }

    let loaded = load_artifacts(&dir).unwrap();
    assert_eq!(loaded.curve, report.curve);
    assert_eq!(loaded.weeks, report.weeks);
    assert_eq!(loaded.month_stats, report.month_stats);
}

#[test]
fn future_schema_is_rejected() {
    let config = ReportConfig::from_toml(CONFIG).unwrap();
    let groups = BTreeMap::new();
    let report = main_report(&groups, &config);
    let json = export_json(&report)
        .unwrap()
        .replacen("\"schema_version\": 1", "\"schema_version\": 99", 1);
    assert!(import_json(&json).is_err());
}

#[test]
fn markdown_and_calendar_render() {
    let config = ReportConfig::from_toml(CONFIG).unwrap();
    let records = tradecal_report::loader::read_json(JSON.as_bytes()).unwrap();
    let groups = group_by_scope(records);
    let report = main_report(&groups, &config);

    let md = generate_markdown(&report);
    assert!(md.contains("# main · 2024-03"));
    assert!(md.contains("| Win Rate | 33% |"));
    assert!(md.contains("📈 Contre sma"));

    let text = render_calendar(report.month, Some(report.today.date), &report.days);
    assert!(text.contains("  1 +"));
    assert!(text.contains("  3 -"));
    assert!(text.contains("[ 4]"));
}
