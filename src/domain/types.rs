use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

use crate::error::{SimResult, SimulationError};

// ============================================================================
// Site
// ============================================================================

/// Geographic location of the installation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Elevation above sea level in meters
    #[serde(default)]
    pub elevation_m: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, elevation_m: None }
    }
}

/// Panel orientation.
///
/// Azimuth uses the south-based convention throughout the crate:
/// 0 = south, -90 = east, 90 = west, 180 = north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Orientation {
    #[validate(range(min = -180.0, max = 180.0))]
    pub azimuth_deg: f64,
    #[validate(range(min = 0.0, max = 90.0))]
    pub tilt_deg: f64,
}

impl Orientation {
    pub const SOUTH: f64 = 0.0;

    pub fn new(azimuth_deg: f64, tilt_deg: f64) -> Self {
        Self { azimuth_deg, tilt_deg }
    }

    /// Azimuth converted to the north-based compass convention (0 = north, 90 = east)
    pub fn compass_azimuth_deg(&self) -> f64 {
        (self.azimuth_deg + 180.0).rem_euclid(360.0)
    }
}

// ============================================================================
// PV array
// ============================================================================

/// Module array as installed: one module type times a count, on one
/// orientation. Several arrays may feed the same inverter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Peak power per module at STC (W)
    pub module_peak_w: f64,
    pub module_count: u32,
    pub orientation: Orientation,
    /// Fractional loss from mounting (0.0-1.0)
    pub mounting_loss: f64,
    /// Power temperature coefficient per °C (negative, e.g. -0.0037)
    pub temperature_coefficient: f64,
    /// Constant heat transfer coefficient for the cell temperature estimate (W/m²K)
    pub thermal_u0: f64,
    #[serde(default)]
    pub shading: Shading,
}

impl ArrayConfig {
    /// Nameplate DC power of the whole array (W)
    pub fn peak_power_w(&self) -> f64 {
        self.module_peak_w * self.module_count as f64
    }
}

/// Obstruction height of the simple horizon model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HorizonLevel {
    #[default]
    None,
    Light,
    Medium,
    Heavy,
}

impl HorizonLevel {
    /// Solar elevation below which the direct beam is blocked (°)
    pub fn threshold_deg(&self) -> f64 {
        match self {
            HorizonLevel::None => 0.0,
            HorizonLevel::Light => 15.0,
            HorizonLevel::Medium => 25.0,
            HorizonLevel::Heavy => 35.0,
        }
    }
}

/// Horizon/obstruction shading applied to plane-of-array irradiance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Shading {
    #[default]
    None,
    /// Percent of irradiance blocked, January first
    Monthly { percent: [f64; 12] },
    /// Uniform obstruction in front of the array: the direct beam is lost
    /// while the sun stands lower than the obstruction in the half-space
    /// the array faces
    Horizon { level: HorizonLevel },
}

impl Shading {
    /// Fraction of irradiance that reaches the array in the given month (1-12)
    pub fn transmission(&self, month: u32) -> f64 {
        match self {
            Shading::Monthly { percent } => {
                let idx = (month.clamp(1, 12) - 1) as usize;
                (1.0 - percent[idx] / 100.0).clamp(0.0, 1.0)
            }
            Shading::None | Shading::Horizon { .. } => 1.0,
        }
    }

    /// Whether the direct beam is blocked for a sun at `sun_elevation_deg`
    /// and compass azimuth `sun_azimuth_deg`
    pub fn blocks_beam(&self, sun_elevation_deg: f64, sun_azimuth_deg: f64, orientation: &Orientation) -> bool {
        let Shading::Horizon { level } = self else {
            return false;
        };
        let threshold = level.threshold_deg();
        if threshold <= 0.0 || sun_elevation_deg >= threshold {
            return false;
        }
        let offset = (sun_azimuth_deg - orientation.compass_azimuth_deg() + 180.0).rem_euclid(360.0) - 180.0;
        offset.abs() < 90.0
    }

    /// Needs the sun position of every interval
    pub fn needs_sun_position(&self) -> bool {
        matches!(self, Shading::Horizon { level } if *level != HorizonLevel::None)
    }

    pub fn validate(&self) -> SimResult<()> {
        if let Shading::Monthly { percent } = self {
            if percent.iter().any(|p| !(0.0..=100.0).contains(p)) {
                return Err(SimulationError::validation(
                    "monthly shading percentages must be within 0-100",
                ));
            }
        }
        Ok(())
    }
}

/// System losses in percent, applied to AC output after clipping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SystemLosses {
    #[validate(range(min = 0.0, max = 100.0))]
    pub wiring_pct: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub soiling_pct: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub mismatch_pct: f64,
    /// Light-induced degradation
    #[validate(range(min = 0.0, max = 100.0))]
    pub lid_pct: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub nameplate_tolerance_pct: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub other_pct: f64,
}

impl SystemLosses {
    pub fn none() -> Self {
        Self {
            wiring_pct: 0.0,
            soiling_pct: 0.0,
            mismatch_pct: 0.0,
            lid_pct: 0.0,
            nameplate_tolerance_pct: 0.0,
            other_pct: 0.0,
        }
    }

    pub fn total_pct(&self) -> f64 {
        self.wiring_pct
            + self.soiling_pct
            + self.mismatch_pct
            + self.lid_pct
            + self.nameplate_tolerance_pct
            + self.other_pct
    }

    /// Remaining fraction after all losses, never negative
    pub fn derate_factor(&self) -> f64 {
        (1.0 - self.total_pct() / 100.0).max(0.0)
    }
}

impl Default for SystemLosses {
    fn default() -> Self {
        Self {
            wiring_pct: 2.0,
            soiling_pct: 2.0,
            mismatch_pct: 2.0,
            lid_pct: 1.0,
            nameplate_tolerance_pct: 3.0,
            other_pct: 0.0,
        }
    }
}

// ============================================================================
// Economics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubsidyMode {
    /// Paid once against the investment in year 0
    #[default]
    Upfront,
    /// Spread evenly over the horizon years
    Amortized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DegradationMode {
    /// Output of year y is (1 - rate)^y of the first year
    #[default]
    Compound,
    /// Output of year y is (1 - rate * y) of the first year
    Linear,
}

/// Itemized hardware prices; the capital cost follows the module count and
/// the number of battery units of a scenario
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ComponentCosts {
    #[validate(range(min = 0.0))]
    pub per_module: f64,
    #[validate(range(min = 0.0))]
    pub inverter: f64,
    #[validate(range(min = 0.0))]
    pub installation: f64,
    #[validate(range(min = 0.0))]
    pub per_battery_unit: f64,
}

impl ComponentCosts {
    pub fn total(&self, module_count: u32, battery_units: u32) -> f64 {
        self.per_module * module_count as f64
            + self.inverter
            + self.installation
            + self.per_battery_unit * battery_units as f64
    }
}

/// Financial and emission assumptions of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EconomicParameters {
    /// Lump sum paid in year 0 on top of the itemized `costs`
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub investment_cost: f64,
    #[serde(default)]
    #[validate(nested)]
    pub costs: ComponentCosts,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub subsidy: f64,
    #[serde(default)]
    pub subsidy_mode: SubsidyMode,
    /// Currency per kWh exported
    #[validate(range(min = 0.0))]
    pub feed_in_tariff: f64,
    /// Whether the feed-in tariff follows the retail price escalation
    #[serde(default)]
    pub feed_in_escalates: bool,
    /// Currency per kWh imported
    #[validate(range(min = 0.0))]
    pub retail_price: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub price_escalation: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub degradation_rate: f64,
    #[serde(default)]
    pub degradation_mode: DegradationMode,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub battery_fade_rate: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub discount_rate: f64,
    #[validate(range(min = 1, max = 100))]
    pub horizon_years: u32,
    /// kg CO2 per kWh of grid electricity
    #[validate(range(min = 0.0))]
    pub grid_co2_kg_per_kwh: f64,
}

impl Default for EconomicParameters {
    fn default() -> Self {
        Self {
            investment_cost: 800.0,
            costs: ComponentCosts::default(),
            subsidy: 0.0,
            subsidy_mode: SubsidyMode::Upfront,
            feed_in_tariff: 0.0,
            feed_in_escalates: false,
            retail_price: 0.32,
            price_escalation: 0.015,
            degradation_rate: 0.005,
            degradation_mode: DegradationMode::Compound,
            battery_fade_rate: 0.0,
            discount_rate: 0.0,
            horizon_years: 15,
            grid_co2_kg_per_kwh: 0.281,
        }
    }
}

impl EconomicParameters {
    /// Folds the itemized costs for the given hardware into `investment_cost`
    pub fn for_hardware(&self, module_count: u32, battery_units: u32) -> Self {
        Self {
            investment_cost: self.investment_cost + self.costs.total(module_count, battery_units),
            costs: ComponentCosts::default(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compass_azimuth() {
        assert_eq!(Orientation::new(0.0, 30.0).compass_azimuth_deg(), 180.0);
        assert_eq!(Orientation::new(-90.0, 30.0).compass_azimuth_deg(), 90.0);
        assert_eq!(Orientation::new(90.0, 30.0).compass_azimuth_deg(), 270.0);
        assert_eq!(Orientation::new(180.0, 30.0).compass_azimuth_deg(), 0.0);
    }

    #[test]
    fn test_orientation_validation() {
        assert!(Orientation::new(0.0, 30.0).validate().is_ok());
        assert!(Orientation::new(0.0, 91.0).validate().is_err());
        assert!(Orientation::new(0.0, -1.0).validate().is_err());
    }

    #[test]
    fn test_location_validation() {
        assert!(Location::new(52.5, 13.4).validate().is_ok());
        assert!(Location::new(95.0, 13.4).validate().is_err());
    }

    #[test]
    fn test_system_losses() {
        let losses = SystemLosses::default();
        assert!((losses.total_pct() - 10.0).abs() < 1e-9);
        assert!((losses.derate_factor() - 0.9).abs() < 1e-9);
        assert_eq!(SystemLosses::none().derate_factor(), 1.0);
    }

    #[test]
    fn test_monthly_shading() {
        let mut percent = [0.0; 12];
        percent[11] = 40.0;
        let shading = Shading::Monthly { percent };
        assert_eq!(shading.transmission(1), 1.0);
        assert!((shading.transmission(12) - 0.6).abs() < 1e-9);
        assert!(shading.validate().is_ok());

        percent[0] = 120.0;
        assert!(Shading::Monthly { percent }.validate().is_err());
    }

    #[test]
    fn test_horizon_blocks_low_sun_in_front() {
        let south = Orientation::new(0.0, 30.0);
        let shading = Shading::Horizon { level: HorizonLevel::Medium };
        // low winter sun due south
        assert!(shading.blocks_beam(12.0, 180.0, &south));
        // above the obstruction
        assert!(!shading.blocks_beam(30.0, 180.0, &south));
        // low sun behind the array
        assert!(!shading.blocks_beam(5.0, 0.0, &south));
        assert!(!shading.blocks_beam(5.0, 275.0, &Orientation::new(-90.0, 30.0)));
        assert!(shading.blocks_beam(5.0, 95.0, &Orientation::new(-90.0, 30.0)));

        let open = Shading::Horizon { level: HorizonLevel::None };
        assert!(!open.blocks_beam(1.0, 180.0, &south));
        assert!(!open.needs_sun_position());
        assert!(shading.needs_sun_position());
        assert_eq!(shading.transmission(12), 1.0);
    }

    #[test]
    fn test_horizon_levels() {
        assert_eq!(HorizonLevel::Light.threshold_deg(), 15.0);
        assert_eq!(HorizonLevel::Heavy.threshold_deg(), 35.0);
        assert_eq!("medium".parse::<HorizonLevel>().unwrap(), HorizonLevel::Medium);
        let shading: Shading = serde_json::from_str(r#"{"mode": "horizon", "level": "heavy"}"#).unwrap();
        assert_eq!(shading, Shading::Horizon { level: HorizonLevel::Heavy });
    }

    #[test]
    fn test_itemized_costs_follow_hardware() {
        let params = EconomicParameters {
            investment_cost: 50.0,
            costs: ComponentCosts { per_module: 70.0, inverter: 249.0, installation: 80.0, per_battery_unit: 599.0 },
            ..Default::default()
        };
        let bare = params.for_hardware(2, 0);
        assert!((bare.investment_cost - (50.0 + 140.0 + 249.0 + 80.0)).abs() < 1e-9);
        assert_eq!(bare.costs, ComponentCosts::default());
        let two_packs = params.for_hardware(2, 2);
        assert!((two_packs.investment_cost - bare.investment_cost - 2.0 * 599.0).abs() < 1e-9);

        let negative = EconomicParameters {
            costs: ComponentCosts { per_battery_unit: -1.0, ..Default::default() },
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_negative_economics_rejected() {
        let params = EconomicParameters { retail_price: -0.1, ..Default::default() };
        assert!(params.validate().is_err());

        let params = EconomicParameters { horizon_years: 0, ..Default::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("amortized".parse::<SubsidyMode>().unwrap(), SubsidyMode::Amortized);
        assert_eq!(DegradationMode::Linear.to_string(), "linear");
    }
}
