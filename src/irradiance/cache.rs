use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::CacheConfig;
use crate::domain::{Location, Orientation};
use crate::error::SimResult;

use super::series::IrradianceSeries;

/// Location and orientation rounded to the cache granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    latitude: i64,
    longitude: i64,
    tilt: i64,
    azimuth: i64,
}

impl CacheKey {
    pub fn new(location: &Location, orientation: &Orientation, config: &CacheConfig) -> Self {
        let coord = 10f64.powi(config.coordinate_decimals as i32);
        let angle = 10f64.powi(config.angle_decimals as i32);
        Self {
            latitude: (location.latitude * coord).round() as i64,
            longitude: (location.longitude * coord).round() as i64,
            tilt: (orientation.tilt_deg * angle).round() as i64,
            azimuth: (orientation.azimuth_deg * angle).round() as i64,
        }
    }
}

type Slot = Arc<OnceCell<Arc<IrradianceSeries>>>;

/// Shared store of resolved irradiance series.
///
/// Each key owns a once-cell: concurrent resolvers of the same key wait on a
/// single initialization, and a failed initialization leaves the cell empty
/// for the next caller. Entries are immutable; refresh swaps the whole slot.
#[derive(Default)]
pub struct IrradianceCache {
    slots: RwLock<HashMap<CacheKey, Slot>>,
}

impl IrradianceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<IrradianceSeries>> {
        self.slots.read().get(key).and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, key: CacheKey) -> Slot {
        if let Some(slot) = self.slots.read().get(&key) {
            return slot.clone();
        }
        self.slots.write().entry(key).or_default().clone()
    }

    /// Cached series for `key`, running `init` at most once across concurrent callers
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: CacheKey, init: F) -> SimResult<Arc<IrradianceSeries>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SimResult<IrradianceSeries>>,
    {
        let slot = self.slot(key);
        slot.get_or_try_init(|| async { init().await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Replaces the entry for `key`; holders of the previous series keep it
    pub fn insert(&self, key: CacheKey, series: IrradianceSeries) -> Arc<IrradianceSeries> {
        let series = Arc::new(series);
        let slot = Arc::new(OnceCell::new_with(Some(series.clone())));
        self.slots.write().insert(key, slot);
        series
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.slots.write().remove(key);
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.slots.read().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
