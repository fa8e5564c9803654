//! Percent surprise of a release against its forecast.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which forecast column a surprise is measured against.
///
/// Each variant falls back to the other column when its own forecast is
/// absent or zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastVariant {
    /// Briefing Forecast, falling back to Market Expects.
    Briefing,
    /// Market Expects, falling back to Briefing Forecast.
    Market,
}

impl ForecastVariant {
    pub const ALL: [ForecastVariant; 2] = [ForecastVariant::Briefing, ForecastVariant::Market];

    pub fn name(self) -> &'static str {
        match self {
            ForecastVariant::Briefing => "briefing",
            ForecastVariant::Market => "market",
        }
    }

    /// Forecast this variant uses given both candidate columns.
    pub fn pick(self, briefing: Option<f64>, market: Option<f64>) -> Option<f64> {
        let (primary, fallback) = match self {
            ForecastVariant::Briefing => (briefing, market),
            ForecastVariant::Market => (market, briefing),
        };
        usable(primary).or(usable(fallback))
    }
}

impl fmt::Display for ForecastVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A forecast a surprise can be divided by.
fn usable(forecast: Option<f64>) -> Option<f64> {
    forecast.filter(|f| f.is_finite() && *f != 0.0)
}

/// `(actual - forecast) / forecast`, or `None` when the forecast is zero or
/// either input is not finite.
pub fn percent_surprise(actual: f64, forecast: f64) -> Option<f64> {
    if !actual.is_finite() || usable(Some(forecast)).is_none() {
        return None;
    }
    Some((actual - forecast) / forecast)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_surprise() {
        let s = percent_surprise(350_000.0, 345_000.0).unwrap();
        assert!((s - 0.014_492_753).abs() < 1e-9);
    }

    #[test]
    fn negative_forecast_keeps_sign_convention() {
        // Deficit narrower than expected: actual above forecast, forecast negative.
        let s = percent_surprise(-36.4e9, -38.0e9).unwrap();
        assert!(s < 0.0);
    }

    #[test]
    fn zero_forecast_is_undefined() {
        assert_eq!(percent_surprise(1.0, 0.0), None);
        assert_eq!(percent_surprise(f64::NAN, 1.0), None);
    }

    #[test]
    fn variants_fall_back_to_each_other() {
        assert_eq!(ForecastVariant::Briefing.pick(Some(1.0), Some(2.0)), Some(1.0));
        assert_eq!(ForecastVariant::Market.pick(Some(1.0), Some(2.0)), Some(2.0));
        assert_eq!(ForecastVariant::Briefing.pick(None, Some(2.0)), Some(2.0));
        assert_eq!(ForecastVariant::Market.pick(Some(1.0), None), Some(1.0));
        assert_eq!(ForecastVariant::Briefing.pick(Some(0.0), Some(2.0)), Some(2.0));
        assert_eq!(ForecastVariant::Market.pick(None, None), None);
    }
}
