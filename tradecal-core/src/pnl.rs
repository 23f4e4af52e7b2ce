//! PnL parser — normalizes currency-like text or numbers into a signed float.
//!
//! Parsing is total: every input yields a finite `f64`, with `0.0` standing in
//! for anything that cannot be read. The `try_` variants expose the failure as
//! `None` so callers can tell "zero" from "absent" when averaging.

use crate::domain::RawAmount;

/// Parse an optional raw amount, `0.0` on absence or failure.
pub fn parse_pnl(input: Option<&RawAmount>) -> f64 {
    input.and_then(try_parse_amount).unwrap_or(0.0)
}

/// Parse a PnL string, `0.0` on failure.
pub fn parse_pnl_str(text: &str) -> f64 {
    try_parse_pnl_str(text).unwrap_or(0.0)
}

/// Parse a raw amount, `None` when it is not a finite number.
pub fn try_parse_amount(input: &RawAmount) -> Option<f64> {
    match input {
        RawAmount::Number(value) => Some(*value).filter(|v| v.is_finite()),
        RawAmount::Text(text) => try_parse_pnl_str(text),
    }
}

/// Strip everything except digits, `.` and `-`, then read the leading number.
///
/// Mirrors a lenient float reader: `"1.2.3"` reads as `1.2`, `"5-3"` as `5`,
/// while `"-"`, `"."` and `""` have no digits and fail.
pub fn try_parse_pnl_str(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    leading_number(&cleaned)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn leading_number(cleaned: &str) -> Option<f64> {
    let bytes = cleaned.as_bytes();
    let mut pos = 0;

    let negative = bytes.first() == Some(&b'-');
    if negative {
        pos = 1;
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_part = &cleaned[int_start..pos];

    let mut frac_part = "";
    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        frac_part = &cleaned[frac_start..frac_end];
    }

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut normalized = String::with_capacity(int_part.len() + frac_part.len() + 3);
    if negative {
        normalized.push('-');
    }
    normalized.push_str(if int_part.is_empty() { "0" } else { int_part });
    if !frac_part.is_empty() {
        normalized.push('.');
        normalized.push_str(frac_part);
    }

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
