//! Representative-year irradiance series and its normalization.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Location;
use crate::error::{SimResult, SimulationError};

/// Calendar year the representative series is laid out on (not a leap year)
pub const REFERENCE_YEAR: i32 = 2019;
pub const HOURS_PER_YEAR: usize = 8760;

/// One record as delivered by a provider; any channel may be missing.
///
/// `beam_w_m2` is only reported by providers that split the plane-of-array
/// irradiance into its direct and diffuse parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: NaiveDateTime,
    pub irradiance_w_m2: Option<f64>,
    #[serde(default)]
    pub beam_w_m2: Option<f64>,
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrradianceSample {
    /// Plane-of-array global irradiance (W/m²)
    pub irradiance_w_m2: f64,
    /// Direct-beam part of the global irradiance (W/m²)
    pub beam_w_m2: f64,
    /// Ambient air temperature (°C)
    pub temperature_c: f64,
}

impl IrradianceSample {
    /// Sample without a beam/diffuse split; all irradiance counts as beam
    pub fn new(irradiance_w_m2: f64, temperature_c: f64) -> Self {
        Self { irradiance_w_m2, beam_w_m2: irradiance_w_m2, temperature_c }
    }
}

/// Gap-free irradiance/temperature series at a fixed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrradianceSeries {
    start: NaiveDateTime,
    step_minutes: u32,
    samples: Vec<IrradianceSample>,
    /// Site the series was resolved for, when known
    #[serde(default)]
    location: Option<Location>,
}

impl IrradianceSeries {
    pub fn from_parts(start: NaiveDateTime, step_minutes: u32, samples: Vec<IrradianceSample>) -> Self {
        Self { start, step_minutes, samples, location: None }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Builds an hourly representative year from provider samples.
    ///
    /// Samples are snapped to the full hour, Feb 29 is dropped and several
    /// years are averaged per hour-of-year. Runs of up to `max_gap_hours`
    /// missing hours are interpolated linearly; the year is treated as cyclic
    /// so Dec 31 23:00 bounds a gap at Jan 1 00:00. Longer runs fail.
    ///
    /// Without any beam values the whole irradiance is taken as beam.
    pub fn from_samples(raw: &[RawSample], max_gap_hours: usize) -> SimResult<Self> {
        if raw.is_empty() {
            return Err(SimulationError::data_unavailable("provider returned no samples"));
        }

        let mut irr = SlotAccumulator::new();
        let mut beam = SlotAccumulator::new();
        let mut temp = SlotAccumulator::new();
        for sample in raw {
            let Some(slot) = hour_of_year(sample.timestamp) else {
                continue;
            };
            if let Some(v) = sample.irradiance_w_m2.filter(|v| v.is_finite()) {
                irr.add(slot, v);
            }
            if let Some(v) = sample.beam_w_m2.filter(|v| v.is_finite()) {
                beam.add(slot, v);
            }
            if let Some(v) = sample.temperature_c.filter(|v| v.is_finite()) {
                temp.add(slot, v);
            }
        }

        let irradiance = fill_cyclic(&irr.means(), max_gap_hours, "irradiance")?;
        let temperature = fill_cyclic(&temp.means(), max_gap_hours, "temperature")?;
        let beam = if beam.is_empty() {
            irradiance.clone()
        } else {
            fill_cyclic(&beam.means(), max_gap_hours, "beam")?
        };

        let samples = irradiance
            .into_iter()
            .zip(beam)
            .zip(temperature)
            .map(|((g, b), t)| {
                let g = g.max(0.0);
                IrradianceSample { irradiance_w_m2: g, beam_w_m2: b.clamp(0.0, g), temperature_c: t }
            })
            .collect::<Vec<_>>();

        debug!(samples = samples.len(), raw = raw.len(), "normalized irradiance series");
        Ok(Self::from_parts(reference_start(), 60, samples))
    }

    /// Linear interpolation onto a finer step; the final hour holds its value
    pub fn resample(&self, step_minutes: u32) -> SimResult<Self> {
        if step_minutes == self.step_minutes {
            return Ok(self.clone());
        }
        if step_minutes == 0 || self.step_minutes % step_minutes != 0 {
            return Err(SimulationError::scenario_config(format!(
                "cannot resample a {} min series to {} min",
                self.step_minutes, step_minutes
            )));
        }

        let per = (self.step_minutes / step_minutes) as usize;
        let mut samples = Vec::with_capacity(self.samples.len() * per);
        for (i, cur) in self.samples.iter().enumerate() {
            let next = self.samples.get(i + 1).unwrap_or(cur);
            for k in 0..per {
                let t = k as f64 / per as f64;
                let lerp = |a: f64, b: f64| a + t * (b - a);
                samples.push(IrradianceSample {
                    irradiance_w_m2: lerp(cur.irradiance_w_m2, next.irradiance_w_m2),
                    beam_w_m2: lerp(cur.beam_w_m2, next.beam_w_m2),
                    temperature_c: lerp(cur.temperature_c, next.temperature_c),
                });
            }
        }
        Ok(Self { start: self.start, step_minutes, samples, location: self.location })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn step_minutes(&self) -> u32 {
        self.step_minutes
    }

    pub fn step_hours(&self) -> f64 {
        self.step_minutes as f64 / 60.0
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn samples(&self) -> &[IrradianceSample] {
        &self.samples
    }

    pub fn timestamp(&self, index: usize) -> NaiveDateTime {
        self.start + Duration::minutes(self.step_minutes as i64 * index as i64)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.samples.len()).map(|i| self.timestamp(i))
    }

    /// Calendar month (1-12) of every interval
    pub fn months(&self) -> Vec<u32> {
        self.timestamps().map(|t| t.month()).collect()
    }

    /// Plane-of-array insolation over the series (kWh/m²)
    pub fn insolation_kwh_m2(&self) -> f64 {
        self.samples.iter().map(|s| s.irradiance_w_m2).sum::<f64>() * self.step_hours() / 1000.0
    }
}

pub fn reference_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(REFERENCE_YEAR, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Slot 0..8760 of a timestamp in a 365-day year; Feb 29 has no slot
pub fn hour_of_year(ts: NaiveDateTime) -> Option<usize> {
    let date = ts.date();
    if date.month() == 2 && date.day() == 29 {
        return None;
    }
    let leap = NaiveDate::from_ymd_opt(date.year(), 2, 29).is_some();
    let mut day = date.ordinal0() as usize;
    if leap && date.month() > 2 {
        day -= 1;
    }
    Some(day * 24 + ts.hour() as usize)
}

struct SlotAccumulator {
    sum: Vec<f64>,
    count: Vec<u32>,
}

impl SlotAccumulator {
    fn new() -> Self {
        Self { sum: vec![0.0; HOURS_PER_YEAR], count: vec![0; HOURS_PER_YEAR] }
    }

    fn add(&mut self, slot: usize, value: f64) {
        self.sum[slot] += value;
        self.count[slot] += 1;
    }

    fn is_empty(&self) -> bool {
        self.count.iter().all(|&c| c == 0)
    }

    fn means(&self) -> Vec<Option<f64>> {
        self.sum
            .iter()
            .zip(&self.count)
            .map(|(s, &c)| (c > 0).then(|| s / c as f64))
            .collect()
    }
}

/// Fills missing values on a cyclic buffer by linear interpolation
fn fill_cyclic(values: &[Option<f64>], max_gap: usize, channel: &str) -> SimResult<Vec<f64>> {
    let n = values.len();
    let Some(anchor) = values.iter().position(Option::is_some) else {
        return Err(SimulationError::data_unavailable(format!("no usable {channel} data")));
    };

    let mut out = vec![0.0; n];
    let mut last_offset = 0usize;
    let mut last_value = values[anchor].unwrap_or_default();
    out[anchor] = last_value;
    let mut filled = 0usize;

    for offset in 1..=n {
        let idx = (anchor + offset) % n;
        let Some(value) = values[idx] else {
            continue;
        };
        let gap = offset - last_offset - 1;
        if gap > max_gap {
            let first_missing = (anchor + last_offset + 1) % n;
            return Err(SimulationError::data_unavailable(format!(
                "{gap} consecutive hours of {channel} missing from hour {first_missing} (limit {max_gap})"
            )));
        }
        for j in 1..=gap {
            let t = j as f64 / (gap + 1) as f64;
            out[(anchor + last_offset + j) % n] = last_value + t * (value - last_value);
        }
        filled += gap;
        out[idx] = value;
        last_offset = offset;
        last_value = value;
    }

    if filled > 0 {
        warn!(channel, filled, "interpolated missing hours");
    }
    Ok(out)
}
