//! Power conversion model: plane-of-array irradiance to AC output.
//!
//! Every array (one per MPPT input) turns its own irradiance series into DC.
//! The DC of all arrays is summed in front of the inverter, which converts
//! and clips once; system losses apply to the inverter output.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ArrayConfig, InverterConfig, Location, SystemLosses};
use crate::error::{SimResult, SimulationError};
use crate::irradiance::{ClearSkyModel, IrradianceSample, IrradianceSeries};

/// Reference cell temperature at STC (°C)
const STC_CELL_TEMP_C: f64 = 25.0;
/// Irradiance at STC (W/m²)
const STC_IRRADIANCE: f64 = 1000.0;

/// DC of one array in one interval (W)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DcPoint {
    pub dc_w: f64,
    /// DC the array would deliver without temperature derating
    pub dc_at_stc_temp_w: f64,
}

/// Power of one interval, all in W
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerPoint {
    /// DC summed over all arrays
    pub dc_w: f64,
    pub dc_at_stc_temp_w: f64,
    /// AC leaving the inverter, before system losses
    pub inverter_ac_w: f64,
    pub clipped_w: f64,
    /// AC after system losses
    pub ac_w: f64,
}

/// Yearly breakdown of where the energy went, in kWh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub dc_kwh: f64,
    pub temperature_loss_kwh: f64,
    pub clipped_kwh: f64,
    pub inverter_ac_kwh: f64,
    pub ac_kwh: f64,
    /// Energy weighted inverter efficiency before clipping
    pub mean_inverter_efficiency: f64,
}

/// One array together with the irradiance on its plane
#[derive(Debug, Clone, Copy)]
pub struct ArrayInput<'a> {
    pub series: &'a IrradianceSeries,
    pub array: &'a ArrayConfig,
}

/// DC side of a single array
pub struct ArrayModel<'a> {
    array: &'a ArrayConfig,
    sun: Option<ClearSkyModel>,
}

impl<'a> ArrayModel<'a> {
    /// `location` is required when the array uses horizon shading
    pub fn new(array: &'a ArrayConfig, location: Option<&Location>) -> SimResult<Self> {
        if !(0.0..1.0).contains(&array.mounting_loss) {
            return Err(SimulationError::validation("mounting loss must be within [0, 1)"));
        }
        if !(array.thermal_u0 > 0.0) {
            return Err(SimulationError::validation("thermal coefficient u0 must be positive"));
        }
        if array.module_peak_w < 0.0 {
            return Err(SimulationError::validation("module peak power cannot be negative"));
        }
        array.shading.validate()?;

        let sun = match (array.shading.needs_sun_position(), location) {
            (false, _) => None,
            (true, Some(loc)) => Some(ClearSkyModel::new(loc.latitude, loc.longitude)),
            (true, None) => {
                return Err(SimulationError::scenario_config(
                    "horizon shading needs a series resolved for a location",
                ))
            }
        };
        Ok(Self { array, sun })
    }

    pub fn cell_temperature(&self, sample: &IrradianceSample) -> f64 {
        sample.temperature_c + sample.irradiance_w_m2 / self.array.thermal_u0
    }

    /// Multiplier on DC output from cell heating; only derates above 25 °C
    pub fn temperature_factor(&self, cell_temp_c: f64) -> f64 {
        if cell_temp_c <= STC_CELL_TEMP_C {
            return 1.0;
        }
        (1.0 + self.array.temperature_coefficient * (cell_temp_c - STC_CELL_TEMP_C)).max(0.0)
    }

    /// Irradiance reaching the cells after shading (W/m²)
    pub fn effective_irradiance(&self, sample: &IrradianceSample, time: NaiveDateTime) -> f64 {
        let g = sample.irradiance_w_m2.max(0.0);
        let shading = &self.array.shading;
        let blocked = self.sun.is_some_and(|sun| {
            let (elevation, azimuth) = sun.solar_position(time);
            shading.blocks_beam(elevation, azimuth, &self.array.orientation)
        });
        let g = if blocked { g - sample.beam_w_m2.clamp(0.0, g) } else { g };
        g * shading.transmission(time.month())
    }

    pub fn dc_at(&self, sample: &IrradianceSample, time: NaiveDateTime) -> DcPoint {
        let g = self.effective_irradiance(sample, time);
        if g <= 0.0 || self.array.module_count == 0 {
            return DcPoint::default();
        }
        let dc_at_stc_temp_w = g / STC_IRRADIANCE * self.array.peak_power_w() * (1.0 - self.array.mounting_loss);
        DcPoint { dc_w: dc_at_stc_temp_w * self.temperature_factor(self.cell_temperature(sample)), dc_at_stc_temp_w }
    }
}

/// All arrays of a system behind one inverter
pub struct PowerModel<'a> {
    arrays: Vec<(ArrayModel<'a>, &'a IrradianceSeries)>,
    inverter: &'a InverterConfig,
    losses: &'a SystemLosses,
}

impl<'a> PowerModel<'a> {
    /// Fails when the series of the arrays do not share one time grid
    pub fn new(inputs: &[ArrayInput<'a>], inverter: &'a InverterConfig, losses: &'a SystemLosses) -> SimResult<Self> {
        let first = inputs
            .first()
            .ok_or_else(|| SimulationError::scenario_config("a system needs at least one array"))?;
        inverter.validate()?;
        if !(0.0..=100.0).contains(&losses.total_pct()) {
            return Err(SimulationError::validation("system losses must add up to 0-100 %"));
        }

        let arrays = inputs
            .iter()
            .map(|input| {
                let s = input.series;
                if s.len() != first.series.len()
                    || s.step_minutes() != first.series.step_minutes()
                    || s.start() != first.series.start()
                {
                    return Err(SimulationError::scenario_config(
                        "irradiance series of all arrays must share start, step and length",
                    ));
                }
                Ok((ArrayModel::new(input.array, s.location())?, s))
            })
            .collect::<SimResult<Vec<_>>>()?;
        Ok(Self { arrays, inverter, losses })
    }

    pub fn len(&self) -> usize {
        self.arrays.first().map_or(0, |(_, s)| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the summed DC of all arrays at interval `index`
    pub fn power_at(&self, index: usize) -> PowerPoint {
        let mut point = PowerPoint::default();
        for (model, series) in &self.arrays {
            let dc = model.dc_at(&series.samples()[index], series.timestamp(index));
            point.dc_w += dc.dc_w;
            point.dc_at_stc_temp_w += dc.dc_at_stc_temp_w;
        }
        let (inverter_ac_w, clipped_w) = self.inverter.convert(point.dc_w);
        point.inverter_ac_w = inverter_ac_w;
        point.clipped_w = clipped_w;
        point.ac_w = inverter_ac_w * self.losses.derate_factor();
        point
    }

    pub fn points(&self) -> Vec<PowerPoint> {
        (0..self.len()).map(|i| self.power_at(i)).collect()
    }
}

/// AC power (W) of a single array for every interval of the series
pub fn convert(
    series: &IrradianceSeries,
    array: &ArrayConfig,
    inverter: &InverterConfig,
    losses: &SystemLosses,
) -> SimResult<Vec<f64>> {
    let model = PowerModel::new(&[ArrayInput { series, array }], inverter, losses)?;
    Ok(model.points().into_iter().map(|p| p.ac_w).collect())
}

/// AC power per interval of all arrays together with the yearly loss breakdown
pub fn convert_with_report(
    inputs: &[ArrayInput<'_>],
    inverter: &InverterConfig,
    losses: &SystemLosses,
) -> SimResult<(Vec<f64>, ConversionReport)> {
    let model = PowerModel::new(inputs, inverter, losses)?;
    let points = model.points();
    let to_kwh = inputs.first().map_or(0.0, |i| i.series.step_hours()) / 1000.0;

    let mut report = ConversionReport::default();
    for p in &points {
        report.dc_kwh += p.dc_w * to_kwh;
        report.temperature_loss_kwh += (p.dc_at_stc_temp_w - p.dc_w) * to_kwh;
        report.clipped_kwh += p.clipped_w * to_kwh;
        report.inverter_ac_kwh += p.inverter_ac_w * to_kwh;
        report.ac_kwh += p.ac_w * to_kwh;
    }
    if report.dc_kwh > 0.0 {
        report.mean_inverter_efficiency = (report.inverter_ac_kwh + report.clipped_kwh) / report.dc_kwh;
    }

    debug!(
        arrays = inputs.len(),
        dc_kwh = report.dc_kwh,
        ac_kwh = report.ac_kwh,
        clipped_kwh = report.clipped_kwh,
        "converted irradiance to AC power"
    );
    Ok((points.into_iter().map(|p| p.ac_w).collect(), report))
}
