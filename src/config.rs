use anyhow::{ensure, Result};
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub resolution: ResolutionConfig,
    pub cache: CacheConfig,
    pub runner: RunnerConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

/// PVGIS endpoint and network behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub start_year: i32,
    pub end_year: i32,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff_bounds(&self) -> (Duration, Duration) {
        let min = Duration::from_millis(self.backoff_min_ms);
        let max = Duration::from_millis(self.backoff_max_ms.max(self.backoff_min_ms));
        (min, max)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://re.jrc.ec.europa.eu/api/v5_3".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            backoff_min_ms: 500,
            backoff_max_ms: 8_000,
            start_year: 2020,
            end_year: 2023,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Simulation step; must divide 60
    pub step_minutes: u32,
    /// Longest run of missing hours that is filled by interpolation
    pub max_gap_hours: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self { step_minutes: 60, max_gap_hours: 6 }
    }
}

impl ResolutionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.step_minutes > 0 && 60 % self.step_minutes == 0,
            "resolution.step_minutes must divide 60, got {}",
            self.step_minutes
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub coordinate_decimals: u32,
    pub angle_decimals: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { coordinate_decimals: 4, angle_decimals: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub max_concurrent_scenarios: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_concurrent_scenarios: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("resources/catalog.json") }
    }
}

/// Subscriber setup; `RUST_LOG` takes precedence over `filter`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    /// JSON lines when true, compact text otherwise
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info,reqwest=warn,hyper=warn".to_string(), json: true }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("BKW__").split("__"));
        let config: Config = figment.extract()?;
        config.resolution.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.resolution.step_minutes, 60);
        assert_eq!(cfg.cache.coordinate_decimals, 4);
        assert!(cfg.provider.base_url.starts_with("https://"));
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BKW__RUNNER__MAX_CONCURRENT_SCENARIOS", "9");
            jail.set_env("BKW__PROVIDER__MAX_RETRIES", "1");
            let cfg = Config::load().expect("config loads");
            assert_eq!(cfg.runner.max_concurrent_scenarios, 9);
            assert_eq!(cfg.provider.max_retries, 1);
            Ok(())
        });
    }

    #[test]
    fn test_step_must_divide_an_hour() {
        for step in [1, 15, 30, 60] {
            assert!(ResolutionConfig { step_minutes: step, ..Default::default() }.validate().is_ok());
        }
        for step in [0, 7, 45, 120] {
            assert!(ResolutionConfig { step_minutes: step, ..Default::default() }.validate().is_err());
        }

        figment::Jail::expect_with(|jail| {
            jail.set_env("BKW__RESOLUTION__STEP_MINUTES", "7");
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("step_minutes"));
            Ok(())
        });
    }

    #[test]
    fn test_logging_defaults() {
        let logging = LoggingConfig::default();
        assert!(logging.json);
        assert!(tracing_subscriber::EnvFilter::try_new(&logging.filter).is_ok());

        figment::Jail::expect_with(|jail| {
            jail.set_env("BKW__LOGGING__JSON", "false");
            jail.set_env("BKW__LOGGING__FILTER", "debug");
            let cfg = Config::load().expect("config loads");
            assert!(!cfg.logging.json);
            assert_eq!(cfg.logging.filter, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_backoff_bounds_are_ordered() {
        let p = ProviderConfig { backoff_min_ms: 1_000, backoff_max_ms: 10, ..Default::default() };
        let (min, max) = p.backoff_bounds();
        assert!(min <= max);
    }
}
