//! Economic projection of a representative year over the investment horizon

use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::domain::{DegradationMode, EconomicParameters, SubsidyMode};
use crate::error::SimResult;
use crate::flow::EnergyTotals;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearResult {
    pub year: u32,
    /// Module output relative to the first year
    pub production_factor: f64,
    pub produced_kwh: f64,
    /// PV used directly, after degradation
    pub self_consumed_kwh: f64,
    /// Delivered from the battery, after degradation and fade
    pub battery_discharged_kwh: f64,
    pub exported_kwh: f64,
    pub savings: f64,
    pub feed_in_revenue: f64,
    pub subsidy: f64,
    pub net_cash_flow: f64,
    pub cumulative_cash_flow: f64,
    pub co2_saved_kg: f64,
    pub cumulative_co2_saved_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationResult {
    /// Year 0 (investment) through the horizon
    pub years: Vec<YearResult>,
    /// Fractional years until the cumulative cash flow turns non-negative
    pub payback_years: Option<f64>,
    pub net_present_value: f64,
    /// Net investment per kWh produced over the horizon
    pub levelized_cost_per_kwh: Option<f64>,
}

impl AmortizationResult {
    pub fn final_cumulative_cash_flow(&self) -> f64 {
        self.years.last().map(|y| y.cumulative_cash_flow).unwrap_or_default()
    }

    pub fn total_co2_saved_kg(&self) -> f64 {
        self.years.last().map(|y| y.cumulative_co2_saved_kg).unwrap_or_default()
    }
}

fn production_factor(params: &EconomicParameters, year: u32) -> f64 {
    let d = params.degradation_rate;
    match params.degradation_mode {
        DegradationMode::Compound => (1.0 - d).powi(year as i32),
        DegradationMode::Linear => (1.0 - d * year as f64).max(0.0),
    }
}

/// Projects first-year physical totals over `params.horizon_years`
pub fn project(first_year: &EnergyTotals, params: &EconomicParameters) -> SimResult<AmortizationResult> {
    params.validate()?;

    let horizon = params.horizon_years;
    let (upfront_subsidy, yearly_subsidy) = match params.subsidy_mode {
        SubsidyMode::Upfront => (params.subsidy, 0.0),
        SubsidyMode::Amortized => (0.0, params.subsidy / horizon as f64),
    };

    let year0 = -params.investment_cost + upfront_subsidy;
    let mut years = Vec::with_capacity(horizon as usize + 1);
    years.push(YearResult {
        year: 0,
        production_factor: 1.0,
        produced_kwh: 0.0,
        self_consumed_kwh: 0.0,
        battery_discharged_kwh: 0.0,
        exported_kwh: 0.0,
        savings: 0.0,
        feed_in_revenue: 0.0,
        subsidy: upfront_subsidy,
        net_cash_flow: year0,
        cumulative_cash_flow: year0,
        co2_saved_kg: 0.0,
        cumulative_co2_saved_kg: 0.0,
    });

    let mut cumulative = year0;
    let mut cumulative_co2 = 0.0;
    let mut npv = year0;
    let mut lifetime_kwh = 0.0;

    for y in 1..=horizon {
        let p = production_factor(params, y);
        let b = p * (1.0 - params.battery_fade_rate).powi(y as i32);
        let escalation = (1.0 + params.price_escalation).powi(y as i32);

        let produced = first_year.produced_kwh * p;
        let direct = first_year.self_consumed_kwh * p;
        let battery = first_year.battery_discharged_kwh * b;
        let exported = first_year.grid_exported_kwh * p;

        let savings = (direct + battery) * params.retail_price * escalation;
        let feed_in_price = if params.feed_in_escalates {
            params.feed_in_tariff * escalation
        } else {
            params.feed_in_tariff
        };
        let feed_in_revenue = exported * feed_in_price;
        let net_cash_flow = savings + feed_in_revenue + yearly_subsidy;
        cumulative += net_cash_flow;

        let co2 = (direct + battery + exported) * params.grid_co2_kg_per_kwh;
        cumulative_co2 += co2;

        npv += net_cash_flow / (1.0 + params.discount_rate).powi(y as i32);
        lifetime_kwh += produced;

        years.push(YearResult {
            year: y,
            production_factor: p,
            produced_kwh: produced,
            self_consumed_kwh: direct,
            battery_discharged_kwh: battery,
            exported_kwh: exported,
            savings,
            feed_in_revenue,
            subsidy: yearly_subsidy,
            net_cash_flow,
            cumulative_cash_flow: cumulative,
            co2_saved_kg: co2,
            cumulative_co2_saved_kg: cumulative_co2,
        });
    }

    let cumulative_series: Vec<f64> = years.iter().map(|y| y.cumulative_cash_flow).collect();
    let payback_years = payback_period(&cumulative_series);
    let net_investment = params.investment_cost - params.subsidy;
    let levelized_cost_per_kwh = (lifetime_kwh > 0.0).then(|| net_investment / lifetime_kwh);

    debug!(
        ?payback_years,
        npv,
        final_cumulative = cumulative,
        co2_kg = cumulative_co2,
        "projected amortization"
    );

    Ok(AmortizationResult { years, payback_years, net_present_value: npv, levelized_cost_per_kwh })
}

/// Fractional year at which the cumulative series (index = year) first turns
/// non-negative, interpolating linearly inside the crossing year
pub fn payback_period(cumulative: &[f64]) -> Option<f64> {
    let first = *cumulative.first()?;
    if first >= 0.0 {
        return Some(0.0);
    }
    cumulative
        .windows(2)
        .enumerate()
        .find(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, w)| i as f64 + -w[0] / (w[1] - w[0]))
}
