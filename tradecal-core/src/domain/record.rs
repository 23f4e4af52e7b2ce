//! Record — a discretionary trade or a published signal, unified for aggregation.

use super::ids::{RecordId, Scope};
use crate::calendar::{day_key, DayKey};
use crate::pnl::try_parse_amount;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a record.
///
/// Only terminal statuses (`Win`, `Loss`, `BreakEven`) feed win/loss and PnL statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Active,
    Win,
    Loss,
    #[serde(alias = "BE")]
    BreakEven,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Active)
    }
}

/// Trade direction. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "LONG", alias = "BUY", alias = "buy")]
    Long,
    #[serde(alias = "SHORT", alias = "SELL", alias = "sell")]
    Short,
}

/// Where a record came from. Decides how a calendar day is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Personal journal entry on an account.
    #[default]
    Trade,
    /// Signal published on a channel.
    Signal,
}

/// A currency-like value as supplied by the store: a number or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Number(value)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// A record's original timestamp as the store holds it.
///
/// Anything the store may hold deserializes; whether it names a real day is
/// decided later by [`day_key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// Epoch milliseconds written as a float; the fraction is dropped.
    Fractional(f64),
    Text(String),
    /// `null` or no timestamp at all.
    #[default]
    Missing,
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

impl From<i64> for RawTimestamp {
    fn from(millis: i64) -> Self {
        RawTimestamp::Millis(millis)
    }
}

/// A trade or signal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    // ── Identification ──
    pub id: RecordId,
    #[serde(default)]
    pub kind: RecordKind,
    pub scope: Scope,
    #[serde(default, alias = "occurredAt")]
    pub occurred_at: RawTimestamp,

    // ── Informational ──
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default, alias = "entryPrice")]
    pub entry_price: Option<RawAmount>,
    #[serde(default, alias = "exitPrice")]
    pub exit_price: Option<RawAmount>,
    #[serde(default, alias = "takeProfit")]
    pub take_profit: Option<RawAmount>,
    #[serde(default, alias = "stopLoss")]
    pub stop_loss: Option<RawAmount>,
    #[serde(default)]
    pub notes: Option<String>,

    // ── Outcome ──
    #[serde(default)]
    pub pnl: Option<RawAmount>,
    pub status: Status,
    #[serde(default, alias = "lossReasons")]
    pub loss_reasons: Vec<String>,
}

impl Record {
    /// Minimal record: everything informational left empty.
    pub fn new(
        id: impl Into<String>,
        scope: impl Into<String>,
        occurred_at: impl Into<RawTimestamp>,
        status: Status,
    ) -> Self {
        Self {
            id: RecordId::new(id),
            kind: RecordKind::Trade,
            scope: Scope::new(scope),
            occurred_at: occurred_at.into(),
            symbol: String::new(),
            direction: None,
            entry_price: None,
            exit_price: None,
            take_profit: None,
            stop_loss: None,
            notes: None,
            pnl: None,
            status,
            loss_reasons: Vec::new(),
        }
    }

    pub fn with_pnl(mut self, pnl: impl Into<RawAmount>) -> Self {
        self.pnl = Some(pnl.into());
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_loss_reasons<I, S>(mut self, reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loss_reasons = reasons.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_levels(
        mut self,
        entry: impl Into<RawAmount>,
        take_profit: impl Into<RawAmount>,
        stop_loss: impl Into<RawAmount>,
    ) -> Self {
        self.entry_price = Some(entry.into());
        self.take_profit = Some(take_profit.into());
        self.stop_loss = Some(stop_loss.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Parsed PnL, or `None` when absent or unparsable.
    pub fn pnl_value(&self) -> Option<f64> {
        let raw = self.pnl.as_ref()?;
        let parsed = try_parse_amount(raw);
        if parsed.is_none() {
            tracing::debug!(record_id = %self.id, pnl = ?raw, "unparsable pnl, excluded from sums");
        }
        parsed
    }

    /// Calendar day of the record in the given local offset, `None` for invalid timestamps.
    pub fn day_key(&self, offset: FixedOffset) -> Option<DayKey> {
        let key = day_key(&self.occurred_at, offset);
        if key.is_none() {
            tracing::debug!(
                record_id = %self.id,
                occurred_at = ?self.occurred_at,
                "invalid timestamp, excluded from calendar views"
            );
        }
        key
    }

    /// First loss-cause code, if any non-blank one was given.
    pub fn primary_loss_reason(&self) -> Option<&str> {
        self.loss_reasons
            .first()
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
    }

    /// Reward-to-risk ratio: |take_profit - entry| / |entry - stop_loss|.
    ///
    /// `None` when any level is missing or unparsable, or when risk is zero.
    pub fn risk_reward(&self) -> Option<f64> {
        let entry = try_parse_amount(self.entry_price.as_ref()?)?;
        let target = try_parse_amount(self.take_profit.as_ref()?)?;
        let stop = try_parse_amount(self.stop_loss.as_ref()?)?;

        let risk = (entry - stop).abs();
        if risk == 0.0 {
            return None;
        }
        Some((target - entry).abs() / risk)
    }
}
