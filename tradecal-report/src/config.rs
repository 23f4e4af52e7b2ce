//! Report configuration — account baselines, loss-reason catalog, local offset.
//!
//! Loaded from a TOML file where every section is optional:
//!
//! ```toml
//! utc_offset = "+01:00"
//!
//! [accounts.main]
//! initial_balance = 50000.0
//! current_balance = 51200.0
//! stop_floor = 47500.0
//!
//! [[accounts.main.session_drawdowns]]
//! month = "2024-03"
//! amount = -850.0
//!
//! [[loss_reasons]]
//! code = "contre_sma"
//! emoji = "📈"
//! label = "Contre sma"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradecal_core::calendar::MonthKey;
use tradecal_core::domain::{AccountBaseline, Scope};

use crate::catalog::{LossReason, LossReasonCatalog};

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid utc_offset '{0}' (expected e.g. \"+01:00\", \"-0530\" or \"UTC\")")]
    InvalidOffset(String),

    #[error("account '{scope}': {field} must not be negative (got {value})")]
    NegativeBalance {
        scope: String,
        field: &'static str,
        value: f64,
    },

    #[error("account '{0}' is configured more than once")]
    DuplicateAccount(String),

    #[error("loss reason '{0}' is configured more than once")]
    DuplicateReason(String),
}

/// A drawdown figure recorded for a month outside the journal (e.g. by the broker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDrawdown {
    pub month: MonthKey,
    pub amount: f64,
}

/// Per-scope account settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub initial_balance: f64,
    #[serde(default)]
    pub current_balance: Option<f64>,
    #[serde(default)]
    pub stop_floor: f64,
    #[serde(default)]
    pub session_drawdowns: Vec<SessionDrawdown>,
}

impl AccountConfig {
    pub fn baseline(&self) -> AccountBaseline {
        AccountBaseline {
            initial_balance: self.initial_balance,
            current_balance_override: self.current_balance,
            stop_floor: self.stop_floor,
        }
    }

    /// Recorded drawdown for `month`; several entries fold to the worst.
    pub fn session_drawdown(&self, month: MonthKey) -> Option<f64> {
        self.session_drawdowns
            .iter()
            .filter(|s| s.month == month)
            .map(|s| -s.amount.abs())
            .reduce(f64::min)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    utc_offset: Option<String>,
    #[serde(default)]
    accounts: BTreeMap<String, AccountConfig>,
    #[serde(default)]
    loss_reasons: Option<Vec<LossReason>>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    offset: FixedOffset,
    accounts: BTreeMap<Scope, AccountConfig>,
    catalog: LossReasonCatalog,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            offset: utc(),
            accounts: BTreeMap::new(),
            catalog: LossReasonCatalog::builtin(),
        }
    }
}

impl ReportConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load from `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        let offset = match raw.utc_offset.as_deref() {
            Some(text) => parse_offset(text)?,
            None => utc(),
        };

        let mut accounts = BTreeMap::new();
        for (name, account) in raw.accounts {
            let scope = Scope::new(name.trim());
            validate_account(&scope, &account)?;
            if accounts.insert(scope.clone(), account).is_some() {
                return Err(ConfigError::DuplicateAccount(scope.to_string()));
            }
        }

        let catalog = match raw.loss_reasons {
            Some(entries) => {
                let mut seen = HashSet::new();
                for entry in &entries {
                    if !seen.insert(entry.code.as_str()) {
                        return Err(ConfigError::DuplicateReason(entry.code.clone()));
                    }
                }
                LossReasonCatalog::new(entries)
            }
            None => LossReasonCatalog::builtin(),
        };

        Ok(Self {
            offset,
            accounts,
            catalog,
        })
    }

    pub fn with_account(mut self, scope: impl Into<String>, account: AccountConfig) -> Self {
        self.accounts.insert(Scope::new(scope), account);
        self
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn catalog(&self) -> &LossReasonCatalog {
        &self.catalog
    }

    pub fn account(&self, scope: &Scope) -> Option<&AccountConfig> {
        self.accounts.get(scope)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.accounts.keys()
    }

    /// Baseline for `scope`, zero when unconfigured.
    pub fn baseline_for(&self, scope: &Scope) -> AccountBaseline {
        self.account(scope)
            .map(AccountConfig::baseline)
            .unwrap_or_default()
    }

    pub fn session_drawdown(&self, scope: &Scope, month: MonthKey) -> Option<f64> {
        self.account(scope)?.session_drawdown(month)
    }
}

fn validate_account(scope: &Scope, account: &AccountConfig) -> Result<(), ConfigError> {
    let checks = [
        ("initial_balance", Some(account.initial_balance)),
        ("current_balance", account.current_balance),
        ("stop_floor", Some(account.stop_floor)),
    ];
    for (field, value) in checks {
        if let Some(v) = value.filter(|v| *v < 0.0) {
            return Err(ConfigError::NegativeBalance {
                scope: scope.to_string(),
                field,
                value: v,
            });
        }
    }
    Ok(())
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse `Z`, `UTC`, `±HH`, `±HHMM` or `±HH:MM`.
pub fn parse_offset(text: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidOffset(text.to_string());
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (&digits[..2], "0"),
        4 => (&digits[..2], &digits[2..]),
        _ => return Err(invalid()),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
