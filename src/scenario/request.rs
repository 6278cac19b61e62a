use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;
use validator::Validate;

use crate::catalog::HardwareCatalog;
use crate::domain::{ArrayConfig, BatteryConfig, EconomicParameters, InverterConfig, Location, Orientation, Shading, SystemLosses};
use crate::error::{SimResult, SimulationError};
use crate::flow::StorageStrategy;
use crate::irradiance::IrradianceSeries;
use crate::load::{LoadProfile, LoadShape};

/// Household consumption as requested by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadSpec {
    /// Constant draw all year
    Flat { watts: f64 },
    /// Annual consumption distributed with a household shape
    Synthetic { shape: LoadShape, annual_kwh: f64 },
    /// Caller-measured profile; must match the simulation step and length
    Series { values_w: Vec<f64>, step_minutes: u32 },
}

impl LoadSpec {
    fn validate(&self) -> SimResult<()> {
        let ok = match self {
            LoadSpec::Flat { watts } => watts.is_finite() && *watts >= 0.0,
            LoadSpec::Synthetic { annual_kwh, .. } => annual_kwh.is_finite() && *annual_kwh >= 0.0,
            LoadSpec::Series { values_w, step_minutes } => {
                *step_minutes > 0 && values_w.iter().all(|v| v.is_finite() && *v >= 0.0)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(SimulationError::validation("load must be finite and non-negative"))
        }
    }

    /// Profile aligned to the intervals of `series`
    pub fn build(&self, series: &IrradianceSeries) -> SimResult<LoadProfile> {
        match self {
            LoadSpec::Flat { watts } => LoadProfile::flat(*watts, series.len(), series.step_minutes()),
            LoadSpec::Synthetic { shape, annual_kwh } => {
                LoadProfile::synthetic(*shape, *annual_kwh, series.timestamps(), series.step_minutes())
            }
            LoadSpec::Series { values_w, step_minutes } => LoadProfile::from_series(values_w.clone(), *step_minutes),
        }
    }
}

/// A further array on its own MPPT input of the same inverter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ArrayRequest {
    pub module_id: String,
    #[validate(range(min = 1, max = 100))]
    pub module_count: u32,
    #[validate(nested)]
    pub orientation: Orientation,
    #[serde(default)]
    pub shading: Shading,
}

/// One scenario as submitted by a caller; hardware is referenced by catalog id.
///
/// The top-level module fields describe the first array; `additional_arrays`
/// adds further orientations behind the same inverter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ScenarioRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[validate(nested)]
    pub location: Location,
    #[validate(nested)]
    pub orientation: Orientation,
    pub module_id: String,
    #[validate(range(min = 1, max = 100))]
    pub module_count: u32,
    pub inverter_id: String,
    #[serde(default)]
    pub battery_id: Option<String>,
    #[serde(default)]
    pub battery_units: u32,
    pub load: LoadSpec,
    #[serde(default)]
    #[validate(nested)]
    pub losses: SystemLosses,
    #[serde(default)]
    pub shading: Shading,
    #[serde(default)]
    #[validate(nested)]
    pub additional_arrays: Vec<ArrayRequest>,
    #[serde(default)]
    pub storage_strategy: StorageStrategy,
    #[validate(nested)]
    pub economics: EconomicParameters,
}

/// A validated request with catalog records resolved into explicit configs
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: Uuid,
    pub name: Option<String>,
    pub location: Location,
    /// First entry is the primary array
    pub arrays: Vec<ArrayConfig>,
    pub inverter: InverterConfig,
    pub losses: SystemLosses,
    pub battery: Option<BatteryConfig>,
    pub battery_units: u32,
    pub load: LoadSpec,
    pub storage_strategy: StorageStrategy,
    pub economics: EconomicParameters,
}

impl Scenario {
    /// Nameplate DC power over all arrays (W)
    pub fn peak_power_w(&self) -> f64 {
        self.arrays.iter().map(ArrayConfig::peak_power_w).sum()
    }
}

impl ScenarioRequest {
    /// Primary array followed by the additional ones
    pub fn arrays(&self) -> impl Iterator<Item = ArrayRequest> + '_ {
        let primary = ArrayRequest {
            module_id: self.module_id.clone(),
            module_count: self.module_count,
            orientation: self.orientation,
            shading: self.shading.clone(),
        };
        std::iter::once(primary).chain(self.additional_arrays.iter().cloned())
    }

    /// Checks ranges and catalog references without touching the network
    pub fn check(&self, catalog: &HardwareCatalog) -> SimResult<()> {
        self.validate()?;
        if self.economics.price_escalation >= 1.0
            || self.economics.degradation_rate >= 1.0
            || self.economics.battery_fade_rate >= 1.0
            || self.economics.discount_rate >= 1.0
        {
            return Err(SimulationError::validation("annual rates must be below 1"));
        }
        self.load.validate()?;
        for array in self.arrays() {
            array.shading.validate()?;
            catalog.module(&array.module_id)?;
        }
        catalog.inverter(&self.inverter_id)?;
        match (&self.battery_id, self.battery_units) {
            (Some(id), _) => {
                catalog.battery(id)?;
            }
            (None, units) if units > 0 => {
                return Err(SimulationError::validation("battery_units given without battery_id"));
            }
            (None, _) => {}
        }
        Ok(())
    }

    pub fn resolve(&self, id: Uuid, catalog: &HardwareCatalog) -> SimResult<Scenario> {
        self.check(catalog)?;

        let arrays = self
            .arrays()
            .map(|a| -> SimResult<ArrayConfig> {
                Ok(catalog.module(&a.module_id)?.array_config(a.module_count, a.orientation, a.shading))
            })
            .collect::<SimResult<Vec<_>>>()?;
        let inverter = catalog.inverter(&self.inverter_id)?.params.clone();
        let battery = match &self.battery_id {
            Some(battery_id) if self.battery_units > 0 => Some(catalog.battery(battery_id)?.config(self.battery_units)),
            _ => None,
        };

        let module_count = arrays.iter().map(|a| a.module_count).sum();
        let installed_units = if battery.is_some() { self.battery_units } else { 0 };

        Ok(Scenario {
            id,
            name: self.name.clone(),
            location: self.location,
            arrays,
            inverter,
            losses: self.losses.clone(),
            battery,
            battery_units: self.battery_units,
            load: self.load.clone(),
            storage_strategy: self.storage_strategy,
            economics: self.economics.for_hardware(module_count, installed_units),
        })
    }

    /// Same request with a different number of battery units
    pub fn with_battery_units(&self, units: u32) -> Self {
        Self { battery_units: units, ..self.clone() }
    }
}

/// Contents of a request file: a single scenario, or a list plus an optional
/// battery sweep applied to each of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequestFile {
    Batch {
        scenarios: Vec<ScenarioRequest>,
        #[serde(default)]
        battery_sweep: Option<Vec<u32>>,
    },
    Single(ScenarioRequest),
}

impl RequestFile {
    /// Parses TOML or JSON, chosen by file extension
    pub fn from_path(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SimulationError::validation(format!("cannot read {}: {e}", path.display())))?;
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    pub fn from_json_str(raw: &str) -> SimResult<Self> {
        serde_json::from_str(raw).map_err(|e| SimulationError::validation(format!("invalid request JSON: {e}")))
    }

    pub fn from_toml_str(raw: &str) -> SimResult<Self> {
        toml::from_str(raw).map_err(|e| SimulationError::validation(format!("invalid request TOML: {e}")))
    }
}
