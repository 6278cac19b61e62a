use anyhow::{Context, Result};
use balcony_pv_sim::{config, telemetry};
use balcony_pv_sim::catalog::HardwareCatalog;
use balcony_pv_sim::irradiance::{IrradianceCache, IrradianceResolver, PvgisProvider};
use balcony_pv_sim::scenario::{BatchEntry, RequestFile, ScenarioRunner, ScenarioSummary};
use config::Config;
use std::sync::Arc;
use telemetry::init_tracing;
use tracing::{info, warn};

const USAGE: &str = "usage: balcony-pv-sim <request.toml|request.json> [--summary]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let request_path = args.next().context(USAGE)?;
    let summary_only = args.any(|a| a == "--summary");

    let cfg = Config::load().context("Failed to load configuration")?;
    init_tracing(&cfg.logging)?;

    let catalog = HardwareCatalog::load(&cfg.catalog.path)
        .with_context(|| format!("Failed to load hardware catalog from {}", cfg.catalog.path.display()))?;
    let provider = PvgisProvider::new(&cfg.provider)?;
    let resolver = IrradianceResolver::new(
        Arc::new(provider),
        Arc::new(IrradianceCache::new()),
        cfg.resolution.clone(),
        cfg.cache.clone(),
    );
    let runner = ScenarioRunner::new(Arc::new(catalog), Arc::new(resolver), &cfg.runner);

    let requests = match RequestFile::from_path(&request_path)
        .with_context(|| format!("Failed to read request file {request_path}"))?
    {
        RequestFile::Single(request) => vec![request],
        RequestFile::Batch { scenarios, battery_sweep: None } => scenarios,
        RequestFile::Batch { scenarios, battery_sweep: Some(units) } => scenarios
            .iter()
            .flat_map(|s| units.iter().map(|&u| s.with_battery_units(u)))
            .collect(),
    };
    info!(scenarios = requests.len(), path = %request_path, "starting evaluation");

    let results = tokio::select! {
        results = runner.run_batch(requests) => results,
        _ = telemetry::shutdown_signal() => {
            warn!("evaluation cancelled");
            anyhow::bail!("evaluation cancelled");
        }
    };

    let output = if summary_only {
        let entries: Vec<_> = results
            .iter()
            .map(|r| BatchEntry::from_result(r, |res| ScenarioSummary::from(res)))
            .collect();
        serde_json::to_string_pretty(&entries)?
    } else {
        let entries: Vec<_> = results.iter().map(|r| BatchEntry::from_result(r, |res| res.clone())).collect();
        serde_json::to_string_pretty(&entries)?
    };
    println!("{output}");

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!(failed, "some scenarios failed");
    }
    Ok(())
}
