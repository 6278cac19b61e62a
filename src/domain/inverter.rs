use serde::{Deserialize, Serialize};

use crate::error::{SimResult, SimulationError};

/// One point of a measured efficiency curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    /// DC input power (W)
    pub power_w: f64,
    /// Conversion efficiency at that input (%)
    pub efficiency_pct: f64,
}

/// DC->AC conversion efficiency of an inverter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EfficiencyCurve {
    Constant { efficiency_pct: f64 },
    /// Piecewise linear over DC input power, points sorted by power
    Curve { points: Vec<EfficiencyPoint> },
}

impl EfficiencyCurve {
    pub fn validate(&self) -> SimResult<()> {
        match self {
            EfficiencyCurve::Constant { efficiency_pct } => {
                if !(0.0..=100.0).contains(efficiency_pct) {
                    return Err(SimulationError::validation(format!(
                        "inverter efficiency {efficiency_pct}% outside 0-100"
                    )));
                }
            }
            EfficiencyCurve::Curve { points } => {
                if points.is_empty() {
                    return Err(SimulationError::validation("efficiency curve has no points"));
                }
                if points.windows(2).any(|w| w[1].power_w <= w[0].power_w) {
                    return Err(SimulationError::validation(
                        "efficiency curve points must be strictly increasing in power",
                    ));
                }
                if points
                    .iter()
                    .any(|p| p.power_w < 0.0 || !(0.0..=100.0).contains(&p.efficiency_pct))
                {
                    return Err(SimulationError::validation(
                        "efficiency curve point out of range",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Efficiency (0.0-1.0) at the given DC input.
    ///
    /// A curve that does not start at 0 W is anchored at (0 W, 0 %); beyond the
    /// last point the last efficiency is held.
    pub fn efficiency_at(&self, dc_w: f64) -> f64 {
        let pct = match self {
            EfficiencyCurve::Constant { efficiency_pct } => *efficiency_pct,
            EfficiencyCurve::Curve { points } => interpolate_curve(points, dc_w.max(0.0)),
        };
        (pct / 100.0).clamp(0.0, 1.0)
    }
}

fn interpolate_curve(points: &[EfficiencyPoint], p: f64) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let (mut prev_w, mut prev_pct) = if first.power_w > 0.0 {
        (0.0, 0.0)
    } else {
        (first.power_w, first.efficiency_pct)
    };
    if p <= prev_w {
        return prev_pct;
    }
    for point in points {
        if point.power_w <= prev_w {
            continue;
        }
        if p <= point.power_w {
            let t = (p - prev_w) / (point.power_w - prev_w);
            return prev_pct + t * (point.efficiency_pct - prev_pct);
        }
        prev_w = point.power_w;
        prev_pct = point.efficiency_pct;
    }
    prev_pct
}

/// Inverter as used by the power conversion model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Rated AC output; anything above is clipped (W)
    pub rated_ac_w: f64,
    pub efficiency: EfficiencyCurve,
    /// DC input below which the inverter does not feed in (W)
    #[serde(default)]
    pub start_threshold_w: f64,
}

impl InverterConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.rated_ac_w > 0.0) {
            return Err(SimulationError::validation("inverter rated AC power must be positive"));
        }
        if self.start_threshold_w < 0.0 {
            return Err(SimulationError::validation("inverter start threshold cannot be negative"));
        }
        self.efficiency.validate()
    }

    /// AC output for a DC input, returned as (ac_w, clipped_w)
    pub fn convert(&self, dc_w: f64) -> (f64, f64) {
        if dc_w <= 0.0 || dc_w < self.start_threshold_w {
            return (0.0, 0.0);
        }
        let ac_raw = dc_w * self.efficiency.efficiency_at(dc_w);
        let ac = ac_raw.min(self.rated_ac_w);
        (ac, ac_raw - ac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn curve() -> EfficiencyCurve {
        EfficiencyCurve::Curve {
            points: vec![
                EfficiencyPoint { power_w: 40.0, efficiency_pct: 90.0 },
                EfficiencyPoint { power_w: 200.0, efficiency_pct: 96.0 },
                EfficiencyPoint { power_w: 800.0, efficiency_pct: 95.0 },
            ],
        }
    }

    #[rstest]
    #[case(0.0, 0.0)]
    #[case(20.0, 0.45)]
    #[case(40.0, 0.90)]
    #[case(120.0, 0.93)]
    #[case(800.0, 0.95)]
    #[case(2000.0, 0.95)]
    fn test_curve_interpolation(#[case] dc_w: f64, #[case] expected: f64) {
        assert!((curve().efficiency_at(dc_w) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_constant_efficiency_capped() {
        let eff = EfficiencyCurve::Constant { efficiency_pct: 96.0 };
        assert!((eff.efficiency_at(300.0) - 0.96).abs() < 1e-12);
    }

    #[test]
    fn test_clipping_is_lost() {
        let inv = InverterConfig {
            rated_ac_w: 600.0,
            efficiency: EfficiencyCurve::Constant { efficiency_pct: 100.0 },
            start_threshold_w: 0.0,
        };
        let (ac, clipped) = inv.convert(800.0);
        assert_eq!(ac, 600.0);
        assert_eq!(clipped, 200.0);
    }

    #[test]
    fn test_start_threshold() {
        let inv = InverterConfig {
            rated_ac_w: 600.0,
            efficiency: EfficiencyCurve::Constant { efficiency_pct: 95.0 },
            start_threshold_w: 10.0,
        };
        assert_eq!(inv.convert(5.0), (0.0, 0.0));
        assert!(inv.convert(100.0).0 > 0.0);
    }

    #[test]
    fn test_curve_validation() {
        assert!(curve().validate().is_ok());
        let bad = EfficiencyCurve::Curve {
            points: vec![
                EfficiencyPoint { power_w: 200.0, efficiency_pct: 96.0 },
                EfficiencyPoint { power_w: 100.0, efficiency_pct: 95.0 },
            ],
        };
        assert!(bad.validate().is_err());
        assert!(EfficiencyCurve::Curve { points: vec![] }.validate().is_err());
    }
}
