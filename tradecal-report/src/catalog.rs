//! Loss-reason catalog — display metadata for opaque cause codes.

use serde::{Deserialize, Serialize};

/// Display metadata for one cause code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossReason {
    pub code: String,
    #[serde(default)]
    pub emoji: String,
    pub label: String,
}

impl LossReason {
    pub fn new(code: &str, emoji: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            emoji: emoji.to_string(),
            label: label.to_string(),
        }
    }
}

/// Ordered catalog of known cause codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LossReasonCatalog {
    entries: Vec<LossReason>,
}

impl LossReasonCatalog {
    pub fn new(entries: Vec<LossReason>) -> Self {
        Self { entries }
    }

    /// The seven built-in setup-failure causes.
    pub fn builtin() -> Self {
        Self::new(vec![
            LossReason::new("crt_contre_crt_htf", "📊", "CRT Contre crt htf"),
            LossReason::new("contre_sma", "📈", "Contre sma"),
            LossReason::new("pas_extremite", "📍", "Pas extrémité"),
            LossReason::new("erreur_psychologique", "🧠", "Erreur psychologique (fomo / panic)"),
            LossReason::new("stop_loss_trop_serre", "⚠️", "Stop loss trop serré"),
            LossReason::new("manip_sans_fvg", "🔄", "Manip sans fvg"),
            LossReason::new("faible_itmss", "📉", "Faible ITMSS"),
        ])
    }

    pub fn get(&self, code: &str) -> Option<&LossReason> {
        self.entries.iter().find(|r| r.code == code)
    }

    /// Label for `code`, or the code itself when unknown.
    pub fn label_for<'a>(&'a self, code: &'a str) -> &'a str {
        self.get(code).map_or(code, |r| r.label.as_str())
    }

    pub fn emoji_for(&self, code: &str) -> Option<&str> {
        self.get(code)
            .map(|r| r.emoji.as_str())
            .filter(|e| !e.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LossReasonCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
