use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::economics::AmortizationResult;
use crate::flow::{EnergyFlowInterval, EnergyTotals, MonthlyTotals};
use crate::production::ConversionReport;

/// Everything computed for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub id: Uuid,
    pub name: Option<String>,
    pub battery_units: u32,
    pub step_minutes: u32,
    pub flows: Vec<EnergyFlowInterval>,
    pub totals: EnergyTotals,
    pub monthly: Vec<MonthlyTotals>,
    pub conversion: ConversionReport,
    /// Months (1-12) in which the battery was bypassed
    pub disabled_months: Vec<u32>,
    pub amortization: AmortizationResult,
}

/// A result without the per-interval flows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub battery_units: u32,
    pub totals: EnergyTotals,
    pub monthly: Vec<MonthlyTotals>,
    pub conversion: ConversionReport,
    pub disabled_months: Vec<u32>,
    pub amortization: AmortizationResult,
}

impl From<&ScenarioResult> for ScenarioSummary {
    fn from(r: &ScenarioResult) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            battery_units: r.battery_units,
            totals: r.totals.clone(),
            monthly: r.monthly.clone(),
            conversion: r.conversion.clone(),
            disabled_months: r.disabled_months.clone(),
            amortization: r.amortization.clone(),
        }
    }
}

/// Serializable outcome of one scenario in a batch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry<T> {
    Ok { result: T },
    Error { kind: &'static str, message: String },
}

impl<T> BatchEntry<T> {
    pub fn from_result<R>(result: &Result<R, crate::error::SimulationError>, map: impl FnOnce(&R) -> T) -> Self {
        match result {
            Ok(r) => BatchEntry::Ok { result: map(r) },
            Err(e) => BatchEntry::Error { kind: e.kind(), message: e.to_string() },
        }
    }
}
