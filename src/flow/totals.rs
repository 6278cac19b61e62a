use serde::{Deserialize, Serialize};

use super::simulator::EnergyFlowInterval;

/// Summed flows of a period in kWh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyTotals {
    pub produced_kwh: f64,
    pub load_kwh: f64,
    /// PV used directly by the load
    pub self_consumed_kwh: f64,
    pub battery_charged_kwh: f64,
    pub battery_discharged_kwh: f64,
    pub grid_imported_kwh: f64,
    pub grid_exported_kwh: f64,
    /// Standby and round-trip losses of the battery
    pub battery_losses_kwh: f64,
    /// Share of the load covered by PV, directly or via the battery
    pub self_sufficiency: f64,
    /// Share of production used on site, directly or via the battery
    pub self_consumption_share: f64,
}

impl EnergyTotals {
    pub fn from_flows<'a>(flows: impl IntoIterator<Item = &'a EnergyFlowInterval>) -> Self {
        let mut totals = Self::default();
        for f in flows {
            totals.produced_kwh += f.produced_wh;
            totals.load_kwh += f.load_wh;
            totals.self_consumed_kwh += f.self_consumed_wh;
            totals.battery_charged_kwh += f.battery_charged_wh;
            totals.battery_discharged_kwh += f.battery_discharged_wh;
            totals.grid_imported_kwh += f.grid_imported_wh;
            totals.grid_exported_kwh += f.grid_exported_wh;
            totals.battery_losses_kwh += f.battery_standby_wh + f.battery_loss_wh;
        }
        // Accumulated in Wh above
        for v in [
            &mut totals.produced_kwh,
            &mut totals.load_kwh,
            &mut totals.self_consumed_kwh,
            &mut totals.battery_charged_kwh,
            &mut totals.battery_discharged_kwh,
            &mut totals.grid_imported_kwh,
            &mut totals.grid_exported_kwh,
            &mut totals.battery_losses_kwh,
        ] {
            *v /= 1000.0;
        }

        if totals.load_kwh > 0.0 {
            totals.self_sufficiency =
                ((totals.self_consumed_kwh + totals.battery_discharged_kwh) / totals.load_kwh).min(1.0);
        }
        if totals.produced_kwh > 0.0 {
            totals.self_consumption_share =
                ((totals.self_consumed_kwh + totals.battery_charged_kwh) / totals.produced_kwh).min(1.0);
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    /// 1-12
    pub month: u32,
    #[serde(flatten)]
    pub totals: EnergyTotals,
}

/// Totals per calendar month, January first; months without intervals are zero
pub fn monthly_totals(flows: &[EnergyFlowInterval], months: &[u32]) -> Vec<MonthlyTotals> {
    (1..=12)
        .map(|month| {
            let in_month = flows.iter().zip(months).filter(|(_, m)| **m == month).map(|(f, _)| f);
            MonthlyTotals { month, totals: EnergyTotals::from_flows(in_month) }
        })
        .collect()
}
