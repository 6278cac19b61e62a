use std::sync::Arc;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::HardwareCatalog;
use crate::config::RunnerConfig;
use crate::economics::project;
use crate::error::{SimResult, SimulationError};
use crate::flow::{monthly_totals, simulate_with_strategy, EnergyTotals, FlowInputs};
use crate::irradiance::IrradianceResolver;
use crate::production::{convert_with_report, ArrayInput};

use super::request::ScenarioRequest;
use super::result::ScenarioResult;

/// Evaluates scenarios against a shared catalog and irradiance cache
#[derive(Clone)]
pub struct ScenarioRunner {
    catalog: Arc<HardwareCatalog>,
    resolver: Arc<IrradianceResolver>,
    limit: Arc<Semaphore>,
}

impl ScenarioRunner {
    pub fn new(catalog: Arc<HardwareCatalog>, resolver: Arc<IrradianceResolver>, config: &RunnerConfig) -> Self {
        Self {
            catalog,
            resolver,
            limit: Arc::new(Semaphore::new(config.max_concurrent_scenarios.max(1))),
        }
    }

    pub fn catalog(&self) -> &HardwareCatalog {
        &self.catalog
    }

    pub async fn run(&self, request: &ScenarioRequest) -> SimResult<ScenarioResult> {
        self.run_with_id(Uuid::new_v4(), request).await
    }

    async fn run_with_id(&self, id: Uuid, request: &ScenarioRequest) -> SimResult<ScenarioResult> {
        let span = info_span!("scenario", id = %id);
        async {
            let result = self.evaluate(id, request).await;
            match &result {
                Ok(r) => info!(
                    produced_kwh = r.totals.produced_kwh,
                    self_sufficiency = r.totals.self_sufficiency,
                    payback_years = ?r.amortization.payback_years,
                    "Scenario finished"
                ),
                Err(e) => warn!(kind = e.kind(), error = %e, "Scenario failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn evaluate(&self, id: Uuid, request: &ScenarioRequest) -> SimResult<ScenarioResult> {
        let scenario = request.resolve(id, &self.catalog)?;
        info!(
            name = scenario.name.as_deref().unwrap_or("-"),
            peak_w = scenario.peak_power_w(),
            arrays = scenario.arrays.len(),
            battery_units = scenario.battery_units,
            "Scenario started"
        );

        // Arrays sharing an orientation share one cached series
        let mut series_per_array = Vec::with_capacity(scenario.arrays.len());
        for array in &scenario.arrays {
            series_per_array.push(self.resolver.resolve(&scenario.location, &array.orientation).await?);
        }
        let series = series_per_array
            .first()
            .cloned()
            .ok_or_else(|| SimulationError::scenario_config("scenario has no array"))?;
        let array_inputs: Vec<ArrayInput<'_>> = scenario
            .arrays
            .iter()
            .zip(&series_per_array)
            .map(|(array, series)| ArrayInput { series: series.as_ref(), array })
            .collect();

        let load = scenario.load.build(&series)?;
        let (production_w, conversion) = convert_with_report(&array_inputs, &scenario.inverter, &scenario.losses)?;
        let months = series.months();

        let inputs = FlowInputs {
            production_w: &production_w,
            months: &months,
            load: &load,
            step_minutes: series.step_minutes(),
        };
        let outcome = simulate_with_strategy(&inputs, scenario.battery.as_ref(), scenario.storage_strategy)?;
        let totals = EnergyTotals::from_flows(&outcome.intervals);
        let monthly = monthly_totals(&outcome.intervals, &months);
        debug!(
            produced_kwh = totals.produced_kwh,
            exported_kwh = totals.grid_exported_kwh,
            imported_kwh = totals.grid_imported_kwh,
            "simulated energy flows"
        );

        let amortization = project(&totals, &scenario.economics)?;

        Ok(ScenarioResult {
            id,
            name: scenario.name,
            battery_units: scenario.battery_units,
            step_minutes: series.step_minutes(),
            flows: outcome.intervals,
            totals,
            monthly,
            conversion,
            disabled_months: outcome.disabled_months,
            amortization,
        })
    }

    /// Evaluates independent scenarios concurrently, at most
    /// `max_concurrent_scenarios` at a time. Results come back in input order,
    /// each with its own outcome.
    pub async fn run_batch(&self, requests: Vec<ScenarioRequest>) -> Vec<SimResult<ScenarioResult>> {
        let count = requests.len();
        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let runner = self.clone();
            tasks.spawn(async move {
                let result = match runner.limit.clone().acquire_owned().await {
                    Ok(_permit) => runner.run(&request).await,
                    Err(_) => Err(SimulationError::Cancelled),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<SimResult<ScenarioResult>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => warn!(error = %e, "Scenario task aborted"),
            }
        }
        info!(scenarios = count, "Batch finished");
        results
            .into_iter()
            .map(|r| r.unwrap_or(Err(SimulationError::Cancelled)))
            .collect()
    }

    /// Same request evaluated for each battery unit count
    pub async fn run_battery_sweep(&self, request: &ScenarioRequest, units: &[u32]) -> Vec<SimResult<ScenarioResult>> {
        let requests = units.iter().map(|&u| request.with_battery_units(u)).collect();
        self.run_batch(requests).await
    }

    /// Runs a scenario as a background task that can be cancelled
    pub fn spawn(&self, request: ScenarioRequest) -> ScenarioHandle {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let runner = self.clone();
        let cancel = token.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(%id, "Scenario cancelled");
                    Err(SimulationError::Cancelled)
                }
                result = runner.run_with_id(id, &request) => result,
            };
            // Receiver may already be gone
            let _ = tx.send(result);
        });

        ScenarioHandle { id, token, result: rx }
    }
}

/// Background scenario evaluation; resolves to the result or `Cancelled`
pub struct ScenarioHandle {
    id: Uuid,
    token: CancellationToken,
    result: oneshot::Receiver<SimResult<ScenarioResult>>,
}

impl ScenarioHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> SimResult<ScenarioResult> {
        self.result.await.unwrap_or(Err(SimulationError::Cancelled))
    }
}
