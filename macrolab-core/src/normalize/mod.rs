//! Value normalization from scraped cell text to typed values.
//!
//! Rules are tried in a fixed priority order and the first match wins:
//!
//! 1. text containing a colon (times of day) passes through unchanged
//! 2. a currency marker in the first two characters is stripped
//! 3. `K`/`M`/`B` and `mln`/`bln` magnitude suffixes scale the number
//! 4. zero-lower-bound rate ranges (`0 to 0.25%`) become `0.25`
//! 5. percent values keep percent scale (`2.5%` → `2.5`), with
//!    decimal-comma and doubled-marker handling
//! 6. "no change / not available / delayed" tokens become missing
//! 7. statistic spellings resolve through the synonym table
//! 8. `bp` suffixes scale to percent, `bcf` suffixes are dropped
//! 9. plain numbers with optional thousands separators
//! 10. anything else passes through unchanged
//!
//! Normalization never fails. Unrecognized input is returned as
//! [`Normalized::Text`] rather than guessed at.

pub mod synonyms;

use std::borrow::Cow;

use crate::domain::Normalized;
pub use synonyms::{canonical_statistic_name, SynonymError, SynonymTable};

/// Upper bound of the zero-lower-bound policy-rate range, in percent.
pub const ZERO_BOUND_UPPER_PCT: f64 = 0.25;

const CURRENCY_MARKERS: [char; 4] = ['$', '€', '£', '¥'];

/// Compared case-insensitively against the trimmed cell.
const MISSING_TOKENS: &[&str] = &[
    "", "-", "--", "---", "na", "n/a", "n.a.", "nan", "unch", "unch.", "unchanged", "delayed",
    "nc",
];

/// Converts single cells to [`Normalized`] values.
#[derive(Debug, Clone, Copy)]
pub struct ValueNormalizer<'a> {
    synonyms: &'a SynonymTable,
}

impl ValueNormalizer<'static> {
    /// Normalizer backed by the embedded synonym table.
    pub fn builtin() -> Self {
        Self::new(SynonymTable::builtin())
    }
}

impl<'a> ValueNormalizer<'a> {
    pub fn new(synonyms: &'a SynonymTable) -> Self {
        Self { synonyms }
    }

    pub fn synonyms(&self) -> &'a SynonymTable {
        self.synonyms
    }

    /// Normalize one cell.
    pub fn normalize(&self, raw: &str) -> Normalized {
        if raw.contains(':') {
            return Normalized::Text(raw.to_string());
        }
        let cell = raw.trim();

        let numeric = strip_currency(cell);

        if let Some(v) = parse_magnitude(&numeric) {
            return Normalized::Number(v);
        }
        if is_zero_bound_range(&numeric) {
            return Normalized::Number(ZERO_BOUND_UPPER_PCT);
        }
        if let Some(v) = parse_percent(&numeric) {
            return Normalized::Number(v);
        }
        if is_missing_token(cell) {
            return Normalized::Missing;
        }
        if let Some(canonical) = self.synonyms.lookup(cell) {
            return Normalized::Text(canonical.to_string());
        }
        if let Some(v) = parse_unit_suffix(&numeric) {
            return Normalized::Number(v);
        }
        if let Some(v) = parse_number(&numeric) {
            return Normalized::Number(v);
        }

        Normalized::Text(cell.to_string())
    }

    /// Canonical statistic name for a raw spelling.
    pub fn statistic(&self, raw: &str) -> String {
        self.synonyms.canonical(raw.trim()).to_string()
    }
}

/// True if the cell is one of the closed "not available" tokens.
pub fn is_missing_token(cell: &str) -> bool {
    let lower = cell.trim().to_lowercase();
    MISSING_TOKENS.contains(&lower.as_str())
}

pub(crate) fn strip_currency(s: &str) -> Cow<'_, str> {
    match s
        .char_indices()
        .take(2)
        .find(|(_, c)| CURRENCY_MARKERS.contains(c))
    {
        Some((idx, marker)) => {
            let mut out = String::with_capacity(s.len());
            out.push_str(&s[..idx]);
            out.push_str(&s[idx + marker.len_utf8()..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(s),
    }
}

/// Parse a plain number, accepting `1,234,567`-style thousands separators.
///
/// Rejects words `f64::from_str` would accept (`inf`, `NaN`) and any comma
/// that is not a thousands separator.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let plain = s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b','));
    if !plain {
        return None;
    }

    let cleaned: Cow<'_, str> = if s.contains(',') {
        if !has_thousands_grouping(s) {
            return None;
        }
        Cow::Owned(s.replace(',', ""))
    } else {
        Cow::Borrowed(s)
    };

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn has_thousands_grouping(s: &str) -> bool {
    let body = s.trim_start_matches(|c: char| c == '-' || c == '+');
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if frac_part.contains(',') {
        return false;
    }
    let mut groups = int_part.split(',');
    let first_ok = groups
        .next()
        .map(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false);
    first_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_magnitude(s: &str) -> Option<f64> {
    let lower = s.to_ascii_lowercase();
    for (suffix, scale) in [("mln", 1e6), ("bln", 1e9)] {
        if let Some(prefix) = lower.strip_suffix(suffix) {
            return parse_number(prefix).map(|v| v * scale);
        }
    }

    let mut tail = s.chars().rev();
    let last = tail.next()?;
    let before = tail.next()?;
    let scale = match last.to_ascii_uppercase() {
        'K' => 1e3,
        'M' => 1e6,
        'B' => 1e9,
        _ => return None,
    };
    if !before.is_ascii_digit() {
        return None;
    }
    parse_number(&s[..s.len() - last.len_utf8()]).map(|v| v * scale)
}

fn is_zero_bound_range(s: &str) -> bool {
    let compact: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .collect::<String>()
        .to_ascii_lowercase();

    let Some((lo, hi)) = compact
        .split_once("to")
        .or_else(|| compact.split_once('-'))
    else {
        return false;
    };

    matches!(
        (parse_number(lo), parse_number(hi)),
        (Some(l), Some(h)) if l == 0.0 && h == ZERO_BOUND_UPPER_PCT
    )
}

fn parse_percent(s: &str) -> Option<f64> {
    let body = s.trim_end_matches('%');
    if body.len() == s.len() {
        return None;
    }

    // "2,5%": the comma is a decimal point.
    let single: Vec<char> = body.chars().chain(std::iter::once('%')).collect();
    let comma_decimal = single.len() >= 3 && single[single.len() - 3] == ',';

    if comma_decimal {
        body.replacen(',', ".", 1)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    } else {
        parse_number(body)
    }
}

fn parse_unit_suffix(s: &str) -> Option<f64> {
    let lower = s.to_ascii_lowercase();
    if let Some(prefix) = lower.strip_suffix("bp") {
        return parse_number(prefix).map(|v| v / 100.0);
    }
    if let Some(prefix) = lower.strip_suffix("bcf") {
        return parse_number(prefix);
    }
    None
}
