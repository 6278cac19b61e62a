//! Energy flow simulation: allocates production against load, with optional
//! storage, one interval at a time without look-ahead.
//!
//! Allocation order per interval:
//! 1. PV covers the load directly
//! 2. Surplus charges the battery, the rest is exported
//! 3. Deficit is covered by battery discharge, the rest is imported

use itertools::izip;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::domain::{BatteryConfig, StorageState, StorageStep};
use crate::error::{SimResult, SimulationError};
use crate::load::LoadProfile;

/// Energy of one interval in Wh
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyFlowInterval {
    pub produced_wh: f64,
    pub load_wh: f64,
    /// PV used directly by the load
    pub self_consumed_wh: f64,
    pub battery_charged_wh: f64,
    pub battery_discharged_wh: f64,
    pub grid_imported_wh: f64,
    pub grid_exported_wh: f64,
    /// Stored energy at the end of the interval
    pub battery_soc_wh: f64,
    pub battery_standby_wh: f64,
    /// Round-trip loss of the discharged energy
    pub battery_loss_wh: f64,
}

impl EnergyFlowInterval {
    /// Sources minus sinks; zero up to rounding
    pub fn balance_error_wh(&self) -> f64 {
        (self.produced_wh + self.grid_imported_wh + self.battery_discharged_wh)
            - (self.load_wh + self.battery_charged_wh + self.grid_exported_wh)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageStrategy {
    /// Battery in use all year
    #[default]
    Always,
    /// Battery bypassed in months where it costs more than it delivers
    SeasonalBypass,
}

/// Aligned production, calendar and load for one simulated year
#[derive(Debug, Clone, Copy)]
pub struct FlowInputs<'a> {
    /// AC production per interval (W)
    pub production_w: &'a [f64],
    /// Calendar month (1-12) per interval
    pub months: &'a [u32],
    pub load: &'a LoadProfile,
    pub step_minutes: u32,
}

impl<'a> FlowInputs<'a> {
    pub fn validate(&self) -> SimResult<()> {
        if self.step_minutes == 0 {
            return Err(SimulationError::scenario_config("simulation step must be positive"));
        }
        if self.load.step_minutes() != self.step_minutes {
            return Err(SimulationError::scenario_config(format!(
                "load resolution {} min does not match production resolution {} min",
                self.load.step_minutes(),
                self.step_minutes
            )));
        }
        if self.load.len() != self.production_w.len() {
            return Err(SimulationError::scenario_config(format!(
                "load has {} intervals, production has {}",
                self.load.len(),
                self.production_w.len()
            )));
        }
        if self.months.len() != self.production_w.len() {
            return Err(SimulationError::scenario_config(format!(
                "calendar has {} intervals, production has {}",
                self.months.len(),
                self.production_w.len()
            )));
        }
        Ok(())
    }

    fn step_hours(&self) -> f64 {
        self.step_minutes as f64 / 60.0
    }
}

/// Result of a simulation run under a storage strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub intervals: Vec<EnergyFlowInterval>,
    /// Months (1-12) in which the battery was bypassed
    pub disabled_months: Vec<u32>,
}

/// Runs the year with the battery active in every month
pub fn simulate(inputs: &FlowInputs<'_>, battery: Option<&BatteryConfig>) -> SimResult<Vec<EnergyFlowInterval>> {
    inputs.validate()?;
    Ok(run(inputs, battery, &[true; 12]))
}

pub fn simulate_with_strategy(
    inputs: &FlowInputs<'_>,
    battery: Option<&BatteryConfig>,
    strategy: StorageStrategy,
) -> SimResult<FlowOutcome> {
    inputs.validate()?;
    let first = run(inputs, battery, &[true; 12]);

    let has_storage = battery.is_some_and(|b| b.capacity_wh > 0.0);
    if strategy == StorageStrategy::Always || !has_storage {
        return Ok(FlowOutcome { intervals: first, disabled_months: Vec::new() });
    }

    let mut benefit = [0.0f64; 12];
    for (interval, month) in first.iter().zip(inputs.months) {
        benefit[month_index(*month)] +=
            interval.battery_discharged_wh - interval.battery_standby_wh - interval.battery_loss_wh;
    }
    let active: [bool; 12] = std::array::from_fn(|m| benefit[m] > 0.0);
    let disabled_months: Vec<u32> = (1..=12).filter(|m| !active[month_index(*m)]).collect();
    debug!(?disabled_months, "seasonal bypass");

    if disabled_months.is_empty() {
        return Ok(FlowOutcome { intervals: first, disabled_months });
    }
    Ok(FlowOutcome { intervals: run(inputs, battery, &active), disabled_months })
}

fn month_index(month: u32) -> usize {
    (month.clamp(1, 12) - 1) as usize
}

fn run(inputs: &FlowInputs<'_>, battery: Option<&BatteryConfig>, active: &[bool; 12]) -> Vec<EnergyFlowInterval> {
    let dt_h = inputs.step_hours();
    let mut storage = battery.map(|b| StorageState::new(b.clone()));

    izip!(inputs.production_w, inputs.load.values_w(), inputs.months)
        .map(|(&production_w, &load_w, &month)| {
            let produced_wh = production_w.max(0.0) * dt_h;
            let load_wh = load_w * dt_h;
            let self_consumed_wh = produced_wh.min(load_wh);
            let surplus_wh = produced_wh - self_consumed_wh;
            let deficit_wh = load_wh - self_consumed_wh;

            let (step, soc_wh) = match storage.as_mut() {
                Some(state) if active[month_index(month)] => {
                    let step = state.step(surplus_wh, deficit_wh, dt_h);
                    (step, state.soc_wh())
                }
                Some(state) => (StorageStep::default(), state.soc_wh()),
                None => (StorageStep::default(), 0.0),
            };

            EnergyFlowInterval {
                produced_wh,
                load_wh,
                self_consumed_wh,
                battery_charged_wh: step.charged_wh,
                battery_discharged_wh: step.discharged_wh,
                grid_imported_wh: (deficit_wh - step.discharged_wh).max(0.0),
                grid_exported_wh: (surplus_wh - step.charged_wh).max(0.0),
                battery_soc_wh: soc_wh,
                battery_standby_wh: step.standby_wh,
                battery_loss_wh: step.conversion_loss_wh,
            }
        })
        .collect()
}
