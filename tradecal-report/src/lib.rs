//! TradeCal Report — configuration, snapshot loading, report assembly, export.
//!
//! This crate builds on `tradecal-core` to provide:
//! - TOML configuration (account baselines, loss-reason catalog, local offset)
//! - JSON/CSV snapshot loading and per-scope grouping
//! - Month report assembly with rayon fan-out over scopes
//! - JSON, CSV, Markdown and text-calendar export

pub mod catalog;
pub mod config;
pub mod export;
pub mod loader;
pub mod report;

pub use catalog::{LossReason, LossReasonCatalog};
pub use config::{AccountConfig, ConfigError, ReportConfig, SessionDrawdown};
pub use loader::{group_by_scope, load_records, LoadError, SnapshotFormat};
pub use report::{
    build_reports, build_scope_report, generate_reports, DaySummary, LabeledReason, LossSummary,
    MonthReport, ReportError, ReportJob, ReportRequest, TodaySummary, WeekSummary,
    SCHEMA_VERSION,
};
