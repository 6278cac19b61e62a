use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Location, Orientation};
use crate::error::SimResult;

use super::series::RawSample;

/// What a provider is asked for: one site and one panel plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrradianceRequest {
    pub location: Location,
    pub orientation: Orientation,
}

impl IrradianceRequest {
    pub fn new(location: Location, orientation: Orientation) -> Self {
        Self { location, orientation }
    }
}

/// Source of plane-of-array irradiance and ambient temperature.
///
/// Implementations return raw, possibly gappy samples covering one or more
/// years; normalization happens in [`super::IrradianceSeries::from_samples`].
/// Any failure to deliver usable data is reported as `DataUnavailable`.
#[async_trait]
pub trait IrradianceProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, request: &IrradianceRequest) -> SimResult<Vec<RawSample>>;
}
