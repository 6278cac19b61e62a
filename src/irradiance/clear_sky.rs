//! # Clear-Sky Irradiance
//!
//! Offline provider built on a clear-sky radiation model: solar position,
//! air-mass attenuation, isotropic transposition onto the tilted plane and a
//! seasonal ambient temperature, with optional seeded cloud cover. Produces a
//! full hourly reference year without touching the network.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::domain::Orientation;
use crate::error::SimResult;

use super::provider::{IrradianceProvider, IrradianceRequest};
use super::series::{reference_start, RawSample, HOURS_PER_YEAR};

const SOLAR_CONSTANT: f64 = 1367.0; // W/m²
const ALBEDO: f64 = 0.2;
/// Diffuse horizontal irradiance as a share of direct normal under clear sky
const DIFFUSE_SHARE: f64 = 0.1;

/// Plane-of-array irradiance split into direct beam and the rest (W/m²)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaneOfArray {
    pub beam: f64,
    /// Sky diffuse plus ground reflection
    pub diffuse: f64,
}

impl PlaneOfArray {
    pub fn global(&self) -> f64 {
        self.beam + self.diffuse
    }
}

/// Clear-sky solar radiation model for one location, timestamps in UTC
#[derive(Debug, Clone, Copy)]
pub struct ClearSkyModel {
    latitude_deg: f64,
    longitude_deg: f64,
}

impl ClearSkyModel {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self { latitude_deg, longitude_deg }
    }

    /// Solar position for a UTC time as (elevation_deg, azimuth_deg).
    ///
    /// Azimuth is compass based: 0 = north, 90 = east, 180 = south.
    pub fn solar_position(&self, time: NaiveDateTime) -> (f64, f64) {
        let day_of_year = time.ordinal() as f64;
        let hour = time.hour() as f64 + time.minute() as f64 / 60.0;

        let declination_rad = (23.45 * (360.0 / 365.0 * (day_of_year + 284.0)).to_radians().sin()).to_radians();
        let latitude_rad = self.latitude_deg.to_radians();

        let solar_time = hour + self.longitude_deg / 15.0;
        let hour_angle_deg = 15.0 * (solar_time - 12.0);
        let hour_angle_rad = hour_angle_deg.to_radians();

        let elevation_sin = latitude_rad.sin() * declination_rad.sin()
            + latitude_rad.cos() * declination_rad.cos() * hour_angle_rad.cos();
        let elevation_rad = elevation_sin.clamp(-1.0, 1.0).asin();

        let denom = latitude_rad.cos() * elevation_rad.cos();
        let azimuth_cos = if denom.abs() < 1e-9 {
            1.0
        } else {
            ((declination_rad.sin() - latitude_rad.sin() * elevation_rad.sin()) / denom).clamp(-1.0, 1.0)
        };
        let mut azimuth_deg = azimuth_cos.acos().to_degrees();

        // Afternoon: sun in the western sky
        if hour_angle_rad.sin() > 0.0 {
            azimuth_deg = 360.0 - azimuth_deg;
        }

        (elevation_rad.to_degrees(), azimuth_deg)
    }

    /// Clear-sky direct normal irradiance (W/m²) at a solar elevation
    fn direct_normal(elevation_deg: f64) -> f64 {
        if elevation_deg <= 0.0 {
            return 0.0;
        }
        let air_mass = if elevation_deg > 5.0 {
            1.0 / elevation_deg.to_radians().sin()
        } else {
            // Avoid the singularity near the horizon
            12.0 - elevation_deg / 5.0
        };
        SOLAR_CONSTANT * 0.7_f64.powf(air_mass.powf(0.678))
    }

    /// Clear-sky global horizontal irradiance (W/m²)
    pub fn clear_sky_irradiance(&self, time: NaiveDateTime) -> f64 {
        let (elevation_deg, _) = self.solar_position(time);
        let dni = Self::direct_normal(elevation_deg);
        dni * elevation_deg.to_radians().sin().max(0.0) + DIFFUSE_SHARE * dni
    }

    /// Clear-sky plane-of-array irradiance (W/m²)
    pub fn plane_of_array(&self, time: NaiveDateTime, orientation: &Orientation) -> f64 {
        self.plane_of_array_components(time, orientation).global()
    }

    /// Beam on the tilted plane, isotropic sky diffuse and ground reflection
    pub fn plane_of_array_components(&self, time: NaiveDateTime, orientation: &Orientation) -> PlaneOfArray {
        let (elevation_deg, sun_azimuth_deg) = self.solar_position(time);
        if elevation_deg <= 0.0 {
            return PlaneOfArray::default();
        }
        let dni = Self::direct_normal(elevation_deg);
        let dhi = DIFFUSE_SHARE * dni;
        let ghi = dni * elevation_deg.to_radians().sin() + dhi;

        let tilt = orientation.tilt_deg.to_radians();
        let elevation = elevation_deg.to_radians();
        let relative_azimuth = (sun_azimuth_deg - orientation.compass_azimuth_deg()).to_radians();
        let cos_incidence =
            elevation.sin() * tilt.cos() + elevation.cos() * tilt.sin() * relative_azimuth.cos();

        let sky = dhi * (1.0 + tilt.cos()) / 2.0;
        let ground = ghi * ALBEDO * (1.0 - tilt.cos()) / 2.0;
        PlaneOfArray { beam: dni * cos_incidence.max(0.0), diffuse: sky + ground }
    }
}

/// Cloud episodes of the synthetic year. Each episode lasts 1 to
/// `max_episode_hours` hours and scales the irradiance by one transmission
/// factor: 1.0 for a clear episode, otherwise drawn from
/// `[min_transmission, max_transmission]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub clear_probability: f64,
    pub min_transmission: f64,
    pub max_transmission: f64,
    pub max_episode_hours: u32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self { clear_probability: 0.4, min_transmission: 0.15, max_transmission: 0.75, max_episode_hours: 6 }
    }
}

impl CloudConfig {
    fn next_episode<R: Rng>(&self, rng: &mut R) -> CloudEpisode {
        let transmission = if rng.gen_bool(self.clear_probability.clamp(0.0, 1.0)) {
            1.0
        } else {
            let lo = self.min_transmission.clamp(0.0, 1.0);
            let hi = self.max_transmission.clamp(lo, 1.0);
            rng.gen_range(lo..=hi)
        };
        CloudEpisode { transmission, hours_left: rng.gen_range(1..=self.max_episode_hours.max(1)) }
    }
}

struct CloudEpisode {
    transmission: f64,
    hours_left: u32,
}

/// Clear-sky provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearSkyConfig {
    /// Cloud episodes; `None` keeps the sky clear all year
    pub clouds: Option<CloudConfig>,
    /// Seed for the cloud sequence; the same seed yields the same year
    pub random_seed: u64,
    /// Annual mean ambient temperature (°C)
    pub mean_temperature_c: f64,
    /// Half the difference between the warmest and coldest month (°C)
    pub seasonal_amplitude_c: f64,
    /// Half the day/night temperature swing (°C)
    pub diurnal_amplitude_c: f64,
}

impl Default for ClearSkyConfig {
    fn default() -> Self {
        Self {
            clouds: Some(CloudConfig::default()),
            random_seed: 42,
            mean_temperature_c: 10.0,
            seasonal_amplitude_c: 9.0,
            diurnal_amplitude_c: 4.0,
        }
    }
}

pub struct ClearSkyProvider {
    config: ClearSkyConfig,
}

impl ClearSkyProvider {
    pub fn new(config: ClearSkyConfig) -> Self {
        Self { config }
    }

    /// Clear sky throughout, no clouds
    pub fn cloudless() -> Self {
        Self::new(ClearSkyConfig { clouds: None, ..Default::default() })
    }

    /// Ambient temperature: coldest around Jan 20, warmest in the afternoon
    fn ambient_temperature(&self, time: NaiveDateTime, latitude_deg: f64) -> f64 {
        let day = time.ordinal() as f64;
        let hour = time.hour() as f64;
        let hemisphere = if latitude_deg < 0.0 { -1.0 } else { 1.0 };
        let seasonal = -hemisphere * self.config.seasonal_amplitude_c * (2.0 * PI * (day - 20.0) / 365.0).cos();
        let diurnal = self.config.diurnal_amplitude_c * (2.0 * PI * (hour - 9.0) / 24.0).sin();
        self.config.mean_temperature_c + seasonal + diurnal
    }

    /// Hourly reference year for the request
    pub fn generate(&self, request: &IrradianceRequest) -> Vec<RawSample> {
        let model = ClearSkyModel::new(request.location.latitude, request.location.longitude);
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        let mut episode = CloudEpisode { transmission: 1.0, hours_left: 0 };
        let start = reference_start();

        (0..HOURS_PER_YEAR)
            .map(|h| {
                let timestamp = start + Duration::hours(h as i64);
                let transmission = match &self.config.clouds {
                    Some(clouds) => {
                        if episode.hours_left == 0 {
                            episode = clouds.next_episode(&mut rng);
                        }
                        episode.hours_left -= 1;
                        episode.transmission
                    }
                    None => 1.0,
                };
                let poa = model.plane_of_array_components(timestamp, &request.orientation);
                RawSample {
                    timestamp,
                    irradiance_w_m2: Some(poa.global() * transmission),
                    beam_w_m2: Some(poa.beam * transmission),
                    temperature_c: Some(self.ambient_temperature(timestamp, request.location.latitude)),
                }
            })
            .collect()
    }
}

impl Default for ClearSkyProvider {
    fn default() -> Self {
        Self::new(ClearSkyConfig::default())
    }
}

#[async_trait]
impl IrradianceProvider for ClearSkyProvider {
    fn name(&self) -> &str {
        "clear-sky"
    }

    async fn fetch(&self, request: &IrradianceRequest) -> SimResult<Vec<RawSample>> {
        let samples = self.generate(request);
        debug!(samples = samples.len(), clouds = self.config.clouds.is_some(), "Generated clear-sky year");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Location;
    use chrono::NaiveDate;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, month, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn test_sun_position_at_solar_noon() {
        // Greenwich, so UTC noon is solar noon
        let model = ClearSkyModel::new(51.5, 0.0);
        let (elevation, azimuth) = model.solar_position(at(6, 21, 12));
        assert!((elevation - 62.0).abs() < 1.5, "elevation {elevation}");
        assert!((azimuth - 180.0).abs() < 1.0, "azimuth {azimuth}");
    }

    #[test]
    fn test_no_irradiance_at_night() {
        let model = ClearSkyModel::new(52.5, 13.4);
        assert_eq!(model.clear_sky_irradiance(at(1, 15, 0)), 0.0);
        assert_eq!(model.plane_of_array(at(1, 15, 0), &Orientation::new(0.0, 30.0)), 0.0);
    }

    #[test]
    fn test_south_tilt_beats_north_tilt_in_winter() {
        let model = ClearSkyModel::new(52.5, 13.4);
        let noon = at(12, 21, 11);
        let south = model.plane_of_array(noon, &Orientation::new(0.0, 60.0));
        let north = model.plane_of_array(noon, &Orientation::new(180.0, 60.0));
        assert!(south > 2.0 * north, "south {south}, north {north}");
    }

    #[test]
    fn test_east_facing_prefers_morning() {
        let model = ClearSkyModel::new(52.5, 0.0);
        let east = Orientation::new(-90.0, 45.0);
        assert!(model.plane_of_array(at(6, 21, 8), &east) > model.plane_of_array(at(6, 21, 16), &east));
    }

    #[test]
    fn test_seeded_year_is_reproducible() {
        let request = IrradianceRequest::new(Location::new(52.5, 13.4), Orientation::new(0.0, 30.0));
        let provider = ClearSkyProvider::default();
        let a = provider.generate(&request);
        let b = provider.generate(&request);
        assert_eq!(a.len(), HOURS_PER_YEAR);
        assert_eq!(a, b);
    }

    #[test]
    fn test_clouds_reduce_insolation() {
        let request = IrradianceRequest::new(Location::new(52.5, 13.4), Orientation::new(0.0, 30.0));
        let total = |samples: Vec<RawSample>| samples.iter().filter_map(|s| s.irradiance_w_m2).sum::<f64>();
        let clear = total(ClearSkyProvider::cloudless().generate(&request));
        let cloudy = total(ClearSkyProvider::default().generate(&request));
        assert!(cloudy < clear);
        // Annual plane-of-array insolation in a plausible range for central Europe
        assert!((800_000.0..3_000_000.0).contains(&clear), "clear {clear}");
    }

    #[test]
    fn test_cloud_transmission_is_configurable() {
        let request = IrradianceRequest::new(Location::new(52.5, 13.4), Orientation::new(0.0, 30.0));
        let clear = ClearSkyProvider::cloudless().generate(&request);
        let half = ClearSkyProvider::new(ClearSkyConfig {
            clouds: Some(CloudConfig { clear_probability: 0.0, min_transmission: 0.5, max_transmission: 0.5, max_episode_hours: 3 }),
            ..Default::default()
        })
        .generate(&request);
        for (c, h) in clear.iter().zip(&half) {
            let (c, h) = (c.irradiance_w_m2.unwrap(), h.irradiance_w_m2.unwrap());
            assert!((h - 0.5 * c).abs() < 1e-9);
        }
    }

    #[test]
    fn test_beam_is_part_of_global() {
        let model = ClearSkyModel::new(52.5, 13.4);
        let poa = model.plane_of_array_components(at(6, 21, 11), &Orientation::new(0.0, 30.0));
        assert!(poa.beam > poa.diffuse);
        assert!((poa.global() - model.plane_of_array(at(6, 21, 11), &Orientation::new(0.0, 30.0))).abs() < 1e-9);

        let request = IrradianceRequest::new(Location::new(52.5, 13.4), Orientation::new(0.0, 30.0));
        for s in ClearSkyProvider::default().generate(&request) {
            assert!(s.beam_w_m2.unwrap() <= s.irradiance_w_m2.unwrap() + 1e-9);
        }
    }

    #[test]
    fn test_summer_warmer_than_winter() {
        let provider = ClearSkyProvider::default();
        assert!(provider.ambient_temperature(at(7, 20, 14), 52.0) > provider.ambient_temperature(at(1, 20, 14), 52.0));
        assert!(provider.ambient_temperature(at(7, 20, 14), -33.0) < provider.ambient_temperature(at(1, 20, 14), -33.0));
    }
}
