use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{SimResult, SimulationError};

fn default_max_soc() -> f64 {
    1.0
}

/// Battery storage parameters for one scenario (all units combined)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BatteryConfig {
    /// Nominal capacity (Wh)
    #[validate(range(min = 0.0))]
    pub capacity_wh: f64,
    #[validate(range(min = 0.0))]
    pub max_charge_w: f64,
    #[validate(range(min = 0.0))]
    pub max_discharge_w: f64,
    /// Round-trip efficiency (0.0-1.0), applied on the discharge path
    #[validate(range(min = 0.01, max = 1.0))]
    pub round_trip_efficiency: f64,
    /// Lowest allowed state of charge as a fraction of capacity
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_soc: f64,
    /// Highest state of charge the pack is charged to, fraction of capacity
    #[serde(default = "default_max_soc")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_soc: f64,
    /// Self-consumption of the storage electronics (W)
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub standby_w: f64,
}

impl BatteryConfig {
    pub fn floor_wh(&self) -> f64 {
        self.capacity_wh * self.min_soc
    }

    pub fn ceiling_wh(&self) -> f64 {
        self.capacity_wh * self.max_soc
    }

    /// Energy that can be cycled between floor and ceiling (Wh)
    pub fn usable_wh(&self) -> f64 {
        self.ceiling_wh() - self.floor_wh()
    }

    /// Field ranges plus the ordering of the SOC window
    pub fn check(&self) -> SimResult<()> {
        self.validate()?;
        if self.min_soc > self.max_soc {
            return Err(SimulationError::validation(format!(
                "min_soc {} exceeds max_soc {}",
                self.min_soc, self.max_soc
            )));
        }
        Ok(())
    }

    /// `units` identical packs wired in parallel
    pub fn scaled(&self, units: u32) -> Self {
        let n = units as f64;
        Self {
            capacity_wh: self.capacity_wh * n,
            max_charge_w: self.max_charge_w * n,
            max_discharge_w: self.max_discharge_w * n,
            standby_w: self.standby_w * n,
            ..self.clone()
        }
    }
}

/// Outcome of one battery step, energy in Wh
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StorageStep {
    /// Taken from the surplus into the battery
    pub charged_wh: f64,
    /// Delivered to the load
    pub discharged_wh: f64,
    /// Removed from SOC by standby draw
    pub standby_wh: f64,
    /// Removed from SOC by round-trip losses
    pub conversion_loss_wh: f64,
}

/// Single-variable battery state machine; the state is the stored energy.
///
/// SOC is kept within `[floor, ceiling]` after every operation.
#[derive(Debug, Clone)]
pub struct StorageState {
    config: BatteryConfig,
    soc_wh: f64,
}

impl StorageState {
    /// Starts at the SOC floor
    pub fn new(config: BatteryConfig) -> Self {
        let soc_wh = config.floor_wh();
        Self { config, soc_wh }
    }

    pub fn soc_wh(&self) -> f64 {
        self.soc_wh
    }

    pub fn floor_wh(&self) -> f64 {
        self.config.floor_wh()
    }

    pub fn capacity_wh(&self) -> f64 {
        self.config.capacity_wh
    }

    pub fn ceiling_wh(&self) -> f64 {
        self.config.ceiling_wh()
    }

    pub fn config(&self) -> &BatteryConfig {
        &self.config
    }

    fn clamp(&mut self) {
        self.soc_wh = self.soc_wh.clamp(self.floor_wh(), self.ceiling_wh().max(self.floor_wh()));
    }

    /// One interval of `dt_h` hours: standby, then charge from `surplus_wh`,
    /// then discharge towards `deficit_wh`.
    ///
    /// Surplus and deficit are never both positive for one interval.
    pub fn step(&mut self, surplus_wh: f64, deficit_wh: f64, dt_h: f64) -> StorageStep {
        let mut out = StorageStep::default();
        if self.capacity_wh() <= 0.0 {
            return out;
        }

        let above_floor = (self.soc_wh - self.floor_wh()).max(0.0);
        out.standby_wh = (self.config.standby_w * dt_h).min(above_floor);
        self.soc_wh -= out.standby_wh;

        if surplus_wh > 0.0 {
            let headroom = (self.ceiling_wh() - self.soc_wh).max(0.0);
            out.charged_wh = surplus_wh.min(self.config.max_charge_w * dt_h).min(headroom);
            self.soc_wh += out.charged_wh;
        }

        if deficit_wh > 0.0 {
            let eta = self.config.round_trip_efficiency;
            let available = (self.soc_wh - self.floor_wh()).max(0.0) * eta;
            out.discharged_wh = deficit_wh.min(self.config.max_discharge_w * dt_h).min(available);
            let drawn = out.discharged_wh / eta;
            out.conversion_loss_wh = drawn - out.discharged_wh;
            self.soc_wh -= drawn;
        }

        self.clamp();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BatteryConfig {
        BatteryConfig {
            capacity_wh: 2000.0,
            max_charge_w: 800.0,
            max_discharge_w: 600.0,
            round_trip_efficiency: 0.9,
            min_soc: 0.1,
            max_soc: 1.0,
            standby_w: 0.0,
        }
    }

    #[test]
    fn test_starts_at_floor() {
        let s = StorageState::new(config());
        assert_eq!(s.soc_wh(), 200.0);
    }

    #[test]
    fn test_charge_limited_by_power() {
        let mut s = StorageState::new(config());
        let step = s.step(1500.0, 0.0, 1.0);
        assert_eq!(step.charged_wh, 800.0);
        assert_eq!(s.soc_wh(), 1000.0);
    }

    #[test]
    fn test_charge_limited_by_headroom() {
        let mut s = StorageState::new(config());
        s.step(800.0, 0.0, 1.0);
        s.step(800.0, 0.0, 1.0);
        let step = s.step(800.0, 0.0, 1.0);
        assert!((step.charged_wh - 200.0).abs() < 1e-9);
        assert_eq!(s.soc_wh(), 2000.0);
    }

    #[test]
    fn test_charge_stops_at_ceiling() {
        let mut s = StorageState::new(BatteryConfig { max_soc: 0.8, ..config() });
        for _ in 0..4 {
            s.step(800.0, 0.0, 1.0);
        }
        assert!((s.soc_wh() - 1600.0).abs() < 1e-9);
        let step = s.step(800.0, 0.0, 1.0);
        assert_eq!(step.charged_wh, 0.0);
        assert!((config().scaled(2).ceiling_wh() - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_soc_window_rejected() {
        assert!(config().check().is_ok());
        let inverted = BatteryConfig { min_soc: 0.6, max_soc: 0.5, ..config() };
        assert!(matches!(inverted.check(), Err(SimulationError::Validation(_))));
    }

    #[test]
    fn test_discharge_applies_round_trip_loss() {
        let mut s = StorageState::new(config());
        s.step(800.0, 0.0, 1.0); // soc 1000
        let step = s.step(0.0, 450.0, 1.0);
        assert!((step.discharged_wh - 450.0).abs() < 1e-9);
        assert!((s.soc_wh() - (1000.0 - 500.0)).abs() < 1e-9);
        assert!((step.conversion_loss_wh - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_discharge_limited_by_floor() {
        let mut s = StorageState::new(config());
        s.step(100.0, 0.0, 1.0); // soc 300, 100 above floor
        let step = s.step(0.0, 500.0, 1.0);
        assert!((step.discharged_wh - 90.0).abs() < 1e-9);
        assert!((s.soc_wh() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_standby_never_crosses_floor() {
        let mut s = StorageState::new(BatteryConfig { standby_w: 50.0, ..config() });
        s.step(20.0, 0.0, 1.0);
        assert!(s.soc_wh() >= s.floor_wh());
        let step = s.step(0.0, 0.0, 1.0);
        assert!(step.standby_wh <= 20.0 + 1e-9);
        assert!((s.soc_wh() - s.floor_wh()).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_is_inert() {
        let mut s = StorageState::new(BatteryConfig { capacity_wh: 0.0, ..config() });
        let step = s.step(500.0, 0.0, 1.0);
        assert_eq!(step, StorageStep::default());
        assert_eq!(s.soc_wh(), 0.0);
    }

    #[test]
    fn test_scaled_units() {
        let two = config().scaled(2);
        assert_eq!(two.capacity_wh, 4000.0);
        assert_eq!(two.max_discharge_w, 1200.0);
        assert_eq!(two.round_trip_efficiency, 0.9);
    }
}
