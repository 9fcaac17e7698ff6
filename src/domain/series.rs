//! Monthly volume series: actuals, forecasts and derived effective volumes.

use super::{Decimal, TimePoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Units observed or forecast for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePoint {
    #[serde(flatten)]
    pub time: TimePoint,
    pub units: Decimal,
}

impl VolumePoint {
    pub fn new(time: TimePoint, units: Decimal) -> Self {
        Self { time, units }
    }
}

/// Rolling-window aggregate for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectivePoint {
    #[serde(flatten)]
    pub time: TimePoint,
    pub value: Decimal,
}

/// Which stored series a lookup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeSource {
    #[default]
    Actuals,
    Forecasts,
}

impl VolumeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeSource::Actuals => "actuals",
            VolumeSource::Forecasts => "forecasts",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actuals" | "actual" => Some(VolumeSource::Actuals),
            "forecasts" | "forecast" => Some(VolumeSource::Forecasts),
            _ => None,
        }
    }
}

/// Which volumes a projection bills against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VolumeBasis {
    #[default]
    Actuals,
    Forecasts,
    /// Actuals up to and including `reference`, forecasts after it.
    Hybrid { reference: TimePoint },
}

/// Parallel actual and forecast series for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeHistory {
    #[serde(default)]
    pub actuals: Vec<VolumePoint>,
    #[serde(default)]
    pub forecasts: Vec<VolumePoint>,
}

impl VolumeHistory {
    pub fn new(actuals: Vec<VolumePoint>, forecasts: Vec<VolumePoint>) -> Self {
        Self { actuals, forecasts }
    }

    pub fn select(&self, source: VolumeSource) -> Vec<VolumePoint> {
        let mut series = match source {
            VolumeSource::Actuals => self.actuals.clone(),
            VolumeSource::Forecasts => self.forecasts.clone(),
        };
        series.sort_by_key(|p| p.time);
        series
    }

    pub fn for_basis(&self, basis: VolumeBasis) -> Vec<VolumePoint> {
        match basis {
            VolumeBasis::Actuals => self.select(VolumeSource::Actuals),
            VolumeBasis::Forecasts => self.select(VolumeSource::Forecasts),
            VolumeBasis::Hybrid { reference } => self.hybrid(reference),
        }
    }

    /// Blend both series around a reference month.
    ///
    /// At or before `reference` an actual wins and a forecast fills in; after
    /// it a forecast wins and an actual fills in. Months present in neither
    /// series stay absent.
    pub fn hybrid(&self, reference: TimePoint) -> Vec<VolumePoint> {
        let actuals: BTreeMap<TimePoint, Decimal> =
            self.actuals.iter().map(|p| (p.time, p.units)).collect();
        let forecasts: BTreeMap<TimePoint, Decimal> =
            self.forecasts.iter().map(|p| (p.time, p.units)).collect();

        let mut months: Vec<TimePoint> = actuals.keys().chain(forecasts.keys()).copied().collect();
        months.sort();
        months.dedup();

        months
            .into_iter()
            .filter_map(|time| {
                let (first, second) = if time <= reference {
                    (&actuals, &forecasts)
                } else {
                    (&forecasts, &actuals)
                };
                first
                    .get(&time)
                    .or_else(|| second.get(&time))
                    .map(|units| VolumePoint::new(time, *units))
            })
            .collect()
    }
}
