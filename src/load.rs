//! Household load profiles at the simulation resolution

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{SimResult, SimulationError};

/// Hour-of-day weights for someone at home during the day
const DAILY_RETIREE: [f64; 24] = [
    0.04, 0.04, 0.04, 0.04, 0.05, 0.06, 0.07, 0.08, 0.10, 0.10, 0.10, 0.10, //
    0.10, 0.08, 0.07, 0.06, 0.05, 0.05, 0.04, 0.04, 0.04, 0.04, 0.04, 0.04,
];

/// Hour-of-day weights with morning and evening peaks
const DAILY_WORKER: [f64; 24] = [
    0.04, 0.04, 0.04, 0.04, 0.06, 0.08, 0.10, 0.10, 0.08, 0.06, 0.04, 0.04, //
    0.04, 0.04, 0.04, 0.04, 0.06, 0.08, 0.10, 0.10, 0.08, 0.06, 0.04, 0.04,
];

/// Month weights, January first; winter heavy
const MONTHLY: [f64; 12] = [
    0.106, 0.096, 0.087, 0.076, 0.063, 0.053, 0.054, 0.062, 0.072, 0.091, 0.100, 0.114,
];

/// Shape of a synthetic household profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoadShape {
    /// Daytime plateau
    #[default]
    Retiree,
    /// Morning and evening peaks
    Worker,
}

impl LoadShape {
    fn daily(&self) -> &'static [f64; 24] {
        match self {
            LoadShape::Retiree => &DAILY_RETIREE,
            LoadShape::Worker => &DAILY_WORKER,
        }
    }
}

/// Consumption in W per interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    values_w: Vec<f64>,
    step_minutes: u32,
}

impl LoadProfile {
    pub fn flat(watts: f64, intervals: usize, step_minutes: u32) -> SimResult<Self> {
        Self::from_series(vec![watts; intervals], step_minutes)
    }

    /// Distributes `annual_kwh` over the given interval timestamps using the
    /// month and hour-of-day weights of `shape`
    pub fn synthetic(
        shape: LoadShape,
        annual_kwh: f64,
        timestamps: impl IntoIterator<Item = NaiveDateTime>,
        step_minutes: u32,
    ) -> SimResult<Self> {
        if !(annual_kwh >= 0.0) {
            return Err(SimulationError::validation("annual consumption cannot be negative"));
        }
        let daily = shape.daily();
        let weights: Vec<f64> = timestamps
            .into_iter()
            .map(|t| MONTHLY[t.month0() as usize] * daily[t.hour() as usize])
            .collect();
        let total: f64 = weights.iter().sum();
        let step_h = step_minutes as f64 / 60.0;
        let values_w = if total > 0.0 && step_h > 0.0 {
            let scale = annual_kwh * 1000.0 / total / step_h;
            weights.iter().map(|w| w * scale).collect()
        } else {
            vec![0.0; weights.len()]
        };
        Self::from_series(values_w, step_minutes)
    }

    pub fn from_series(values_w: Vec<f64>, step_minutes: u32) -> SimResult<Self> {
        if step_minutes == 0 {
            return Err(SimulationError::validation("load step must be positive"));
        }
        if let Some(bad) = values_w.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SimulationError::validation(format!("invalid load value {bad} W")));
        }
        Ok(Self { values_w, step_minutes })
    }

    pub fn values_w(&self) -> &[f64] {
        &self.values_w
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn len(&self) -> usize {
        self.values_w.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values_w.is_empty()
    }

    pub fn energy_kwh(&self) -> f64 {
        self.values_w.iter().sum::<f64>() * self.step_minutes as f64 / 60_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    fn hourly_year() -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (0..8760).map(|h| start + Duration::hours(h)).collect()
    }

    #[test]
    fn test_flat_profile() {
        let load = LoadProfile::flat(150.0, 8760, 60).unwrap();
        assert_eq!(load.len(), 8760);
        assert!((load.energy_kwh() - 1314.0).abs() < 1e-6);
    }

    #[rstest]
    #[case(LoadShape::Retiree)]
    #[case(LoadShape::Worker)]
    fn test_synthetic_sums_to_annual(#[case] shape: LoadShape) {
        let load = LoadProfile::synthetic(shape, 2500.0, hourly_year(), 60).unwrap();
        assert_eq!(load.len(), 8760);
        assert!((load.energy_kwh() - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn test_synthetic_shapes() {
        let retiree = LoadProfile::synthetic(LoadShape::Retiree, 2000.0, hourly_year(), 60).unwrap();
        let worker = LoadProfile::synthetic(LoadShape::Worker, 2000.0, hourly_year(), 60).unwrap();
        // Jan 1, 11:00 vs 19:00
        assert!(retiree.values_w()[11] > retiree.values_w()[19]);
        assert!(worker.values_w()[19] > worker.values_w()[11]);
        // December draws more than June at the same hour
        let june_noon = (31 + 28 + 31 + 30 + 31 + 14) * 24 + 12;
        let dec_noon = (334 + 14) * 24 + 12;
        assert!(retiree.values_w()[dec_noon] > retiree.values_w()[june_noon]);
    }

    #[test]
    fn test_quarter_hour_synthetic() {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let stamps = (0..8760 * 4).map(|i| start + Duration::minutes(15 * i));
        let load = LoadProfile::synthetic(LoadShape::Worker, 1000.0, stamps, 15).unwrap();
        assert_eq!(load.len(), 8760 * 4);
        assert!((load.energy_kwh() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_negative_values() {
        assert!(LoadProfile::from_series(vec![100.0, -1.0], 60).is_err());
        assert!(LoadProfile::from_series(vec![100.0], 0).is_err());
        assert!(LoadProfile::synthetic(LoadShape::Retiree, -5.0, hourly_year(), 60).is_err());
    }

    #[test]
    fn test_shape_parsing() {
        assert_eq!("worker".parse::<LoadShape>().unwrap(), LoadShape::Worker);
    }
}
