//! Irradiance resolution: provider access, normalization into a
//! representative year, and caching per rounded location/orientation.

pub mod cache;
pub mod clear_sky;
pub mod provider;
pub mod pvgis;
pub mod series;

pub use cache::{CacheKey, IrradianceCache};
pub use clear_sky::{ClearSkyConfig, ClearSkyModel, ClearSkyProvider, CloudConfig};
pub use provider::{IrradianceProvider, IrradianceRequest};
pub use pvgis::PvgisProvider;
pub use series::{IrradianceSample, IrradianceSeries, RawSample};

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CacheConfig, ResolutionConfig};
use crate::domain::{Location, Orientation};
use crate::error::SimResult;

/// Resolves a location and orientation to a cached, normalized series
pub struct IrradianceResolver {
    provider: Arc<dyn IrradianceProvider>,
    cache: Arc<IrradianceCache>,
    resolution: ResolutionConfig,
    cache_config: CacheConfig,
}

impl IrradianceResolver {
    pub fn new(
        provider: Arc<dyn IrradianceProvider>,
        cache: Arc<IrradianceCache>,
        resolution: ResolutionConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self { provider, cache, resolution, cache_config }
    }

    pub fn cache(&self) -> &Arc<IrradianceCache> {
        &self.cache
    }

    pub fn key(&self, location: &Location, orientation: &Orientation) -> CacheKey {
        CacheKey::new(location, orientation, &self.cache_config)
    }

    pub async fn resolve(&self, location: &Location, orientation: &Orientation) -> SimResult<Arc<IrradianceSeries>> {
        let key = self.key(location, orientation);
        if let Some(series) = self.cache.get(&key) {
            debug!(?key, "irradiance cache hit");
            return Ok(series);
        }
        let request = IrradianceRequest::new(*location, *orientation);
        self.cache
            .get_or_try_insert_with(key, || self.load(request))
            .await
    }

    /// Fetches again and replaces the cached entry
    pub async fn refresh(&self, location: &Location, orientation: &Orientation) -> SimResult<Arc<IrradianceSeries>> {
        let key = self.key(location, orientation);
        let series = self.load(IrradianceRequest::new(*location, *orientation)).await?;
        Ok(self.cache.insert(key, series))
    }

    async fn load(&self, request: IrradianceRequest) -> SimResult<IrradianceSeries> {
        info!(
            provider = self.provider.name(),
            lat = request.location.latitude,
            lon = request.location.longitude,
            tilt = request.orientation.tilt_deg,
            azimuth = request.orientation.azimuth_deg,
            "Resolving irradiance"
        );
        let raw = self.provider.fetch(&request).await?;
        let hourly = IrradianceSeries::from_samples(&raw, self.resolution.max_gap_hours)?;
        Ok(hourly.resample(self.resolution.step_minutes)?.with_location(request.location))
    }
}
