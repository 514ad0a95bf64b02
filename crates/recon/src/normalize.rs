//! Key canonicalization and quantity coercion.
//!
//! Normalized keys are lookup values only. They are recomputed from the raw
//! cells on every run and never stored.

use crate::error::ReconError;
use crate::table::Cell;

/// Trailing artifact left by numeric-to-string float coercion.
const FLOAT_SUFFIX: &str = ".0";
/// Trailing noise character appended by some scanner exports.
const SCANNER_ARTIFACT: char = '[';

/// Canonicalize a raw key cell. Empty string means "no key" and never matches.
pub fn normalize_key(raw: &Cell) -> String {
    match raw {
        Cell::Empty => String::new(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) if !v.is_finite() => String::new(),
        Cell::Float(v) => normalize_text(&stringify_float(*v)),
        Cell::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Cell::Text(s) => normalize_text(s),
    }
}

/// Text form of [`normalize_key`]: trim, uppercase, strip a trailing `.0` and
/// trailing `[` characters, repeated until stable.
pub fn normalize_text(raw: &str) -> String {
    let mut key = raw.trim().to_uppercase();
    loop {
        let before = key.len();
        if key.ends_with(FLOAT_SUFFIX) {
            key.truncate(key.len() - FLOAT_SUFFIX.len());
        }
        let kept = key.trim_end_matches(SCANNER_ARTIFACT).trim_end().len();
        key.truncate(kept);
        if key.len() == before {
            return key;
        }
    }
}

fn stringify_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        v.to_string()
    }
}

/// Parse a quantity cell, `None` when missing or non-numeric.
/// Negative values are passed through unchanged.
pub fn parse_quantity(raw: &Cell) -> Option<i64> {
    match raw {
        Cell::Empty => None,
        Cell::Int(v) => Some(*v),
        Cell::Float(v) => float_to_int(*v),
        Cell::Bool(b) => Some(i64::from(*b)),
        Cell::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().and_then(float_to_int))
        }
    }
}

fn float_to_int(v: f64) -> Option<i64> {
    if v.is_finite() && v.abs() < i64::MAX as f64 {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

/// Coerce a quantity cell, substituting `default` for missing or unparseable values.
pub fn coerce_quantity(raw: &Cell, default: i64) -> i64 {
    match parse_quantity(raw) {
        Some(q) => q,
        None => {
            tracing::trace!("quantity {raw:?} not numeric, using default {default}");
            default
        }
    }
}

/// Sum quantities, failing instead of wrapping when the total leaves `i64`.
pub fn checked_total<I>(key: &str, quantities: I) -> Result<i64, ReconError>
where
    I: IntoIterator<Item = i64>,
{
    quantities
        .into_iter()
        .try_fold(0i64, |acc, q| acc.checked_add(q))
        .ok_or_else(|| overflow(key))
}

pub(crate) fn overflow(key: &str) -> ReconError {
    ReconError::QuantityOverflow { key: key.to_string() }
}
