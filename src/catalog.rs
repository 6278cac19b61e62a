//! Read-only hardware catalog: PV modules, inverters and battery packs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;
use validator::Validate;

use crate::domain::{ArrayConfig, BatteryConfig, InverterConfig, Orientation, Shading};
use crate::error::{SimResult, SimulationError};

fn default_thermal_u0() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ModuleRecord {
    #[validate(length(min = 1))]
    pub id: String,
    pub model: String,
    /// Peak power at STC (W)
    #[validate(range(min = 1.0, max = 1000.0))]
    pub peak_w: f64,
    /// Per °C, negative for crystalline silicon
    #[validate(range(min = -0.02, max = 0.0))]
    pub temperature_coefficient: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 0.99))]
    pub mounting_loss: f64,
    #[serde(default = "default_thermal_u0")]
    #[validate(range(min = 1.0))]
    pub thermal_u0: f64,
}

impl ModuleRecord {
    pub fn array_config(&self, module_count: u32, orientation: Orientation, shading: Shading) -> ArrayConfig {
        ArrayConfig {
            module_peak_w: self.peak_w,
            module_count,
            orientation,
            mounting_loss: self.mounting_loss,
            temperature_coefficient: self.temperature_coefficient,
            thermal_u0: self.thermal_u0,
            shading,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InverterRecord {
    #[validate(length(min = 1))]
    pub id: String,
    pub model: String,
    #[serde(flatten)]
    pub params: InverterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BatteryRecord {
    #[validate(length(min = 1))]
    pub id: String,
    pub model: String,
    /// Parameters of a single unit
    #[serde(flatten)]
    #[validate(nested)]
    pub params: BatteryConfig,
}

impl BatteryRecord {
    pub fn config(&self, units: u32) -> BatteryConfig {
        self.params.scaled(units)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareCatalog {
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
    #[serde(default)]
    pub inverters: Vec<InverterRecord>,
    #[serde(default)]
    pub batteries: Vec<BatteryRecord>,
}

impl HardwareCatalog {
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SimulationError::Catalog(format!("cannot read {}: {e}", path.display())))?;
        let catalog = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            modules = catalog.modules.len(),
            inverters = catalog.inverters.len(),
            batteries = catalog.batteries.len(),
            "Loaded hardware catalog"
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> SimResult<Self> {
        let catalog: Self =
            serde_json::from_str(raw).map_err(|e| SimulationError::Catalog(format!("invalid catalog JSON: {e}")))?;
        catalog.check()?;
        Ok(catalog)
    }

    fn check(&self) -> SimResult<()> {
        let invalid = |id: &str, e: String| SimulationError::Catalog(format!("record '{id}': {e}"));

        for m in &self.modules {
            m.validate().map_err(|e| invalid(&m.id, e.to_string()))?;
        }
        for i in &self.inverters {
            i.validate().map_err(|e| invalid(&i.id, e.to_string()))?;
            i.params.validate().map_err(|e| invalid(&i.id, e.to_string()))?;
        }
        for b in &self.batteries {
            b.validate().map_err(|e| invalid(&b.id, e.to_string()))?;
            b.params.check().map_err(|e| invalid(&b.id, e.to_string()))?;
        }

        check_unique("module", self.modules.iter().map(|m| m.id.as_str()))?;
        check_unique("inverter", self.inverters.iter().map(|i| i.id.as_str()))?;
        check_unique("battery", self.batteries.iter().map(|b| b.id.as_str()))
    }

    pub fn module(&self, id: &str) -> SimResult<&ModuleRecord> {
        self.modules
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| SimulationError::validation(format!("unknown module '{id}'")))
    }

    pub fn inverter(&self, id: &str) -> SimResult<&InverterRecord> {
        self.inverters
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| SimulationError::validation(format!("unknown inverter '{id}'")))
    }

    pub fn battery(&self, id: &str) -> SimResult<&BatteryRecord> {
        self.batteries
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| SimulationError::validation(format!("unknown battery '{id}'")))
    }
}

fn check_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> SimResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SimulationError::Catalog(format!("duplicate {kind} id '{id}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EfficiencyCurve;

    const CATALOG: &str = r#"{
        "modules": [
            {"id": "m-400", "model": "Mono 400", "peak_w": 400, "temperature_coefficient": -0.0034, "mounting_loss": 0.02}
        ],
        "inverters": [
            {"id": "inv-800", "model": "Micro 800", "rated_ac_w": 800, "start_threshold_w": 5,
             "efficiency": {"kind": "curve", "points": [{"power_w": 50, "efficiency_pct": 92.0}, {"power_w": 400, "efficiency_pct": 96.5}]}},
            {"id": "inv-600", "model": "Micro 600", "rated_ac_w": 600,
             "efficiency": {"kind": "constant", "efficiency_pct": 95.0}}
        ],
        "batteries": [
            {"id": "bat-1", "model": "Pack 1.6", "capacity_wh": 1600, "max_charge_w": 800, "max_discharge_w": 1200,
             "round_trip_efficiency": 0.9, "min_soc": 0.1, "standby_w": 2}
        ]
    }"#;

    #[test]
    fn test_parses_catalog() {
        let catalog = HardwareCatalog::from_json_str(CATALOG).unwrap();
        let module = catalog.module("m-400").unwrap();
        assert_eq!(module.thermal_u0, 20.0);

        let array = module.array_config(2, Orientation::new(90.0, 30.0), Shading::None);
        assert_eq!(array.peak_power_w(), 800.0);
        assert_eq!(array.orientation.azimuth_deg, 90.0);

        let inverter = catalog.inverter("inv-800").unwrap();
        assert!(matches!(inverter.params.efficiency, EfficiencyCurve::Curve { .. }));
        assert_eq!(inverter.params.start_threshold_w, 5.0);
        assert_eq!(catalog.inverter("inv-600").unwrap().params.start_threshold_w, 0.0);

        let battery = catalog.battery("bat-1").unwrap().config(2);
        assert_eq!(battery.capacity_wh, 3200.0);
        assert_eq!(battery.standby_w, 4.0);
        assert_eq!(battery.max_soc, 1.0);
    }

    #[test]
    fn test_unknown_id_is_validation_error() {
        let catalog = HardwareCatalog::from_json_str(CATALOG).unwrap();
        assert!(matches!(catalog.module("nope"), Err(SimulationError::Validation(_))));
        assert!(matches!(catalog.battery("nope"), Err(SimulationError::Validation(_))));
    }

    #[test]
    fn test_invalid_records_rejected() {
        let bad_efficiency = CATALOG.replace("\"round_trip_efficiency\": 0.9", "\"round_trip_efficiency\": 1.4");
        assert!(matches!(HardwareCatalog::from_json_str(&bad_efficiency), Err(SimulationError::Catalog(_))));

        let bad_curve = CATALOG.replace("\"power_w\": 400", "\"power_w\": 10");
        assert!(matches!(HardwareCatalog::from_json_str(&bad_curve), Err(SimulationError::Catalog(_))));

        let inverted_window = CATALOG.replace("\"min_soc\": 0.1", "\"min_soc\": 0.1, \"max_soc\": 0.05");
        assert!(matches!(HardwareCatalog::from_json_str(&inverted_window), Err(SimulationError::Catalog(_))));

        let duplicate = CATALOG.replace("\"inv-600\"", "\"inv-800\"");
        assert!(matches!(HardwareCatalog::from_json_str(&duplicate), Err(SimulationError::Catalog(_))));

        assert!(matches!(HardwareCatalog::from_json_str("{not json"), Err(SimulationError::Catalog(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(HardwareCatalog::load("/nonexistent/catalog.json"), Err(SimulationError::Catalog(_))));
    }
}
