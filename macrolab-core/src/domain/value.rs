//! Normalized: the typed result of normalizing one text cell.

use serde::{Deserialize, Serialize};

/// Output of the value normalizer.
///
/// A cell is either a magnitude-scaled number, explicitly missing, or text that
/// matched no numeric rule (a canonical statistic name, a time of day, or an
/// unrecognized token passed through unchanged).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Normalized {
    Number(f64),
    Missing,
    Text(String),
}

impl Normalized {
    /// The numeric value, if this cell is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Normalized::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Normalized::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Normalized::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_kind_holds() {
        let n = Normalized::Number(1.5);
        assert_eq!(n.as_number(), Some(1.5));
        assert!(!n.is_missing());
        assert!(n.as_text().is_none());

        let m = Normalized::Missing;
        assert!(m.is_missing());
        assert!(m.as_number().is_none());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_string(&Normalized::Number(2.0)).unwrap();
        assert_eq!(json, r#"{"kind":"number","value":2.0}"#);
        let json = serde_json::to_string(&Normalized::Missing).unwrap();
        assert_eq!(json, r#"{"kind":"missing"}"#);
    }
}
