//! Record snapshot loading.
//!
//! A snapshot is an export of the journal/signal store:
//! - `.json`: an array of records
//! - `.csv`: one record per row with a header; `loss_reasons` holds
//!   `;`-separated codes
//!
//! Loading is strict about file structure and lenient about values: a
//! malformed PnL or timestamp never fails the load, it is handled later by
//! the core's total parsers.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tradecal_core::domain::{
    Direction, RawAmount, RawTimestamp, Record, RecordId, RecordKind, Scope, Status,
};

/// Errors from the snapshot loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON snapshot '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSV snapshot '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported snapshot format '{0}' (expected .json or .csv)")]
    UnknownFormat(PathBuf),
}

/// Snapshot file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Csv,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Load every record from a snapshot file.
pub fn load_records(path: &Path) -> Result<Vec<Record>, LoadError> {
    let format = SnapshotFormat::from_path(path)
        .ok_or_else(|| LoadError::UnknownFormat(path.to_path_buf()))?;
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let records = match format {
        SnapshotFormat::Json => read_json(file).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        SnapshotFormat::Csv => read_csv(file).map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?,
    };

    tracing::info!(path = %path.display(), records = records.len(), "loaded snapshot");
    Ok(records)
}

/// Read a JSON array of records.
pub fn read_json<R: Read>(reader: R) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_reader(reader)
}

/// One CSV row. Every value column is text so that the core parsers see the
/// raw store contents.
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    #[serde(default)]
    kind: Option<RecordKind>,
    scope: String,
    #[serde(default)]
    occurred_at: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    direction: Option<Direction>,
    #[serde(default)]
    entry_price: Option<String>,
    #[serde(default)]
    exit_price: Option<String>,
    #[serde(default)]
    take_profit: Option<String>,
    #[serde(default)]
    stop_loss: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    pnl: Option<String>,
    status: Status,
    #[serde(default)]
    loss_reasons: Option<String>,
}

impl From<CsvRow> for Record {
    fn from(row: CsvRow) -> Self {
        let amount = |v: Option<String>| v.map(RawAmount::Text);
        Record {
            id: RecordId::new(row.id),
            kind: row.kind.unwrap_or_default(),
            scope: Scope::new(row.scope.trim()),
            occurred_at: row
                .occurred_at
                .filter(|text| !text.trim().is_empty())
                .map_or(RawTimestamp::Missing, RawTimestamp::Text),
            symbol: row.symbol.unwrap_or_default(),
            direction: row.direction,
            entry_price: amount(row.entry_price),
            exit_price: amount(row.exit_price),
            take_profit: amount(row.take_profit),
            stop_loss: amount(row.stop_loss),
            notes: row.notes,
            pnl: amount(row.pnl),
            status: row.status,
            loss_reasons: split_reasons(row.loss_reasons.as_deref().unwrap_or("")),
        }
    }
}

/// Read CSV rows with a header line.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Record>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(false)
        .from_reader(reader);
    rdr.deserialize::<CsvRow>()
        .map(|row| row.map(Record::from))
        .collect()
}

fn split_reasons(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect()
}

/// Partition records by scope, keeping input order within each scope.
pub fn group_by_scope(records: Vec<Record>) -> BTreeMap<Scope, Vec<Record>> {
    let mut groups: BTreeMap<Scope, Vec<Record>> = BTreeMap::new();
    for record in records {
        groups.entry(record.scope.clone()).or_default().push(record);
    }
    for (scope, records) in &groups {
        tracing::debug!(scope = %scope, records = records.len(), "grouped scope");
    }
    groups
}
