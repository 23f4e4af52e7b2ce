//! AccountBaseline — per-scope starting equity and stop configuration.

use serde::{Deserialize, Serialize};

/// Externally supplied account configuration for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBaseline {
    /// Starting equity.
    pub initial_balance: f64,

    /// Authoritative equity as of the most recent recorded activity, if known.
    #[serde(default, alias = "current_balance")]
    pub current_balance_override: Option<f64>,

    /// Non-trailing stop level. Zero disables the trailing stop.
    #[serde(default)]
    pub stop_floor: f64,
}

impl AccountBaseline {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            current_balance_override: None,
            stop_floor: 0.0,
        }
    }

    pub fn with_override(mut self, current_balance: f64) -> Self {
        self.current_balance_override = Some(current_balance);
        self
    }

    pub fn with_stop_floor(mut self, stop_floor: f64) -> Self {
        self.stop_floor = stop_floor;
        self
    }

    pub fn trailing_enabled(&self) -> bool {
        self.stop_floor != 0.0
    }

    /// Equity now: the override when present, else initial balance plus all-time PnL.
    pub fn current_balance(&self, all_time_pnl: f64) -> f64 {
        self.current_balance_override
            .unwrap_or(self.initial_balance + all_time_pnl)
    }

    /// Equity before the first recorded activity.
    ///
    /// With an override the history is reconciled backwards from it, so the
    /// cumulative series ends exactly at the override.
    pub fn start_balance(&self, all_time_pnl: f64) -> f64 {
        match self.current_balance_override {
            Some(current) => current - all_time_pnl,
            None => self.initial_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_balance_without_override() {
        let b = AccountBaseline::new(1_000.0);
        assert_eq!(b.current_balance(250.0), 1_250.0);
        assert_eq!(b.start_balance(250.0), 1_000.0);
    }

    #[test]
    fn override_is_authoritative() {
        let b = AccountBaseline::new(1_000.0).with_override(1_400.0);
        assert_eq!(b.current_balance(250.0), 1_400.0);
        assert_eq!(b.start_balance(250.0), 1_150.0);
    }

    #[test]
    fn zero_floor_disables_trailing() {
        assert!(!AccountBaseline::new(500.0).trailing_enabled());
        assert!(AccountBaseline::new(500.0).with_stop_floor(100.0).trailing_enabled());
    }

    #[test]
    fn deserialize_accepts_short_override_name() {
        let b: AccountBaseline =
            serde_json::from_str(r#"{"initial_balance": 10.0, "current_balance": 12.0}"#).unwrap();
        assert_eq!(b.current_balance_override, Some(12.0));
        assert_eq!(b.stop_floor, 0.0);
    }
}
