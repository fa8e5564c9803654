//! RawEventRecord: one scraped economic-calendar row, kept as plain text.

use serde::{Deserialize, Serialize};

/// One economic-indicator release as scraped from a weekly calendar page.
///
/// Every field is the verbatim cell text. Nothing is parsed here; the
/// canonicalizer and normalizer produce typed values from a record without
/// mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEventRecord {
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Week")]
    pub week: String,
    /// Calendar day within the year, e.g. `"Jan 8"`.
    #[serde(rename = "Date")]
    pub date: String,
    /// Release time, e.g. `"8:30 am"` (Eastern).
    #[serde(rename = "Time (ET)")]
    pub time: String,
    #[serde(rename = "Statistic")]
    pub statistic: String,
    /// Reference period the figure covers, e.g. `"Dec"` or `"Q4"`.
    #[serde(rename = "For")]
    pub period: String,
    #[serde(rename = "Actual")]
    pub actual: String,
    #[serde(rename = "Briefing Forecast")]
    pub briefing_forecast: String,
    #[serde(rename = "Market Expects")]
    pub market_expects: String,
    #[serde(rename = "Prior")]
    pub prior: String,
    #[serde(rename = "Revised")]
    pub revised: String,
}

/// The numeric cells that row corrections are allowed to rewrite.
///
/// `Prior` is deliberately absent: corrections never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericField {
    Actual,
    BriefingForecast,
    MarketExpects,
    Revised,
}

impl NumericField {
    pub const ALL: [NumericField; 4] = [
        NumericField::Actual,
        NumericField::BriefingForecast,
        NumericField::MarketExpects,
        NumericField::Revised,
    ];

    /// Column header of this field in the persisted table.
    pub fn header(self) -> &'static str {
        match self {
            NumericField::Actual => "Actual",
            NumericField::BriefingForecast => "Briefing Forecast",
            NumericField::MarketExpects => "Market Expects",
            NumericField::Revised => "Revised",
        }
    }
}

impl RawEventRecord {
    /// Read one of the correctable numeric cells.
    pub fn field(&self, field: NumericField) -> &str {
        match field {
            NumericField::Actual => &self.actual,
            NumericField::BriefingForecast => &self.briefing_forecast,
            NumericField::MarketExpects => &self.market_expects,
            NumericField::Revised => &self.revised,
        }
    }

    /// Return a copy of this record with one numeric cell replaced.
    pub fn with_field(&self, field: NumericField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        let slot = match field {
            NumericField::Actual => &mut next.actual,
            NumericField::BriefingForecast => &mut next.briefing_forecast,
            NumericField::MarketExpects => &mut next.market_expects,
            NumericField::Revised => &mut next.revised,
        };
        *slot = value.into();
        next
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn with_field_leaves_other_cells_untouched() {
        let original = record("Initial Claims", "Jan 14", "8:30 am", "350", "345", "340");
        let changed = original.with_field(NumericField::Actual, "350K");

        assert_eq!(changed.actual, "350K");
        assert_eq!(changed.briefing_forecast, "345");
        assert_eq!(changed.prior, original.prior);
        assert_eq!(original.actual, "350");
    }

    #[test]
    fn field_reads_match_headers() {
        let r = record("GDP", "Jan 29", "8:30 am", "5.7%", "4.6%", "4.7%");
        assert_eq!(r.field(NumericField::MarketExpects), "4.7%");
        assert_eq!(NumericField::MarketExpects.header(), "Market Expects");
    }
}
