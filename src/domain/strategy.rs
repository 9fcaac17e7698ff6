//! Lookup strategy: how historical volume rolls into one effective figure.

use super::VolumeSource;
use serde::{Deserialize, Serialize};

/// Rolling-window reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationMethod {
    #[default]
    Sum,
    Avg,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Sum => "SUM",
            AggregationMethod::Avg => "AVG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUM" => Some(AggregationMethod::Sum),
            "AVG" => Some(AggregationMethod::Avg),
            _ => None,
        }
    }
}

/// `(source, method, lookback_months)` for one contract.
///
/// `lookback_months` counts months *before* the current one, so the window
/// always holds at least the current month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupStrategy {
    #[serde(default)]
    pub source: VolumeSource,
    #[serde(default)]
    pub method: AggregationMethod,
    #[serde(default)]
    pub lookback_months: u32,
}

impl LookupStrategy {
    pub fn new(source: VolumeSource, method: AggregationMethod, lookback_months: u32) -> Self {
        Self {
            source,
            method,
            lookback_months,
        }
    }

    pub fn window_len(&self) -> usize {
        self.lookback_months as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_len_includes_current_month() {
        let s = LookupStrategy::new(VolumeSource::Actuals, AggregationMethod::Sum, 0);
        assert_eq!(s.window_len(), 1);
        let s = LookupStrategy::new(VolumeSource::Actuals, AggregationMethod::Avg, 2);
        assert_eq!(s.window_len(), 3);
    }

    #[test]
    fn test_strategy_json_shape() {
        let s: LookupStrategy =
            serde_json::from_str(r#"{"source":"forecasts","method":"AVG","lookbackMonths":5}"#)
                .unwrap();
        assert_eq!(s.source, VolumeSource::Forecasts);
        assert_eq!(s.method, AggregationMethod::Avg);
        assert_eq!(s.lookback_months, 5);

        let default: LookupStrategy = serde_json::from_str("{}").unwrap();
        assert_eq!(default.method, AggregationMethod::Sum);
        assert_eq!(default.window_len(), 1);

        assert!(serde_json::from_str::<LookupStrategy>(r#"{"lookbackMonths":-1}"#).is_err());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(AggregationMethod::parse("avg"), Some(AggregationMethod::Avg));
        assert_eq!(AggregationMethod::parse("median"), None);
    }
}
