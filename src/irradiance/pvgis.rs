//! PVGIS (EU Joint Research Centre) hourly radiation client
//!
//! Uses the `seriescalc` endpoint with the PV calculation disabled and the
//! radiation components enabled, so the response carries the plane-of-array
//! beam `Gb(i)`, diffuse `Gd(i)` and reflected `Gr(i)` irradiance plus 2 m air
//! temperature `T2m` for every hour of the requested years. Rows with a
//! single global `G(i)` value are accepted as well.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::ProviderConfig;
use crate::error::{SimResult, SimulationError};

use super::provider::{IrradianceProvider, IrradianceRequest};
use super::series::RawSample;

const TIME_FORMAT: &str = "%Y%m%d:%H%M";

pub struct PvgisProvider {
    client: ClientWithMiddleware,
    base_url: String,
    start_year: i32,
    end_year: i32,
}

impl PvgisProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("balcony-pv-sim/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .context("Failed to build PVGIS HTTP client")?;

        let (min, max) = config.backoff_bounds();
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(min, max)
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            start_year: config.start_year,
            end_year: config.end_year,
        })
    }

    fn query(&self, request: &IrradianceRequest) -> Vec<(&'static str, String)> {
        vec![
            ("lat", format!("{:.4}", request.location.latitude)),
            ("lon", format!("{:.4}", request.location.longitude)),
            ("angle", format!("{:.1}", request.orientation.tilt_deg)),
            ("aspect", format!("{:.1}", request.orientation.azimuth_deg)),
            ("startyear", self.start_year.to_string()),
            ("endyear", self.end_year.to_string()),
            ("pvcalculation", "0".to_string()),
            ("components", "1".to_string()),
            ("outputformat", "json".to_string()),
        ]
    }
}

#[async_trait]
impl IrradianceProvider for PvgisProvider {
    fn name(&self) -> &str {
        "pvgis"
    }

    async fn fetch(&self, request: &IrradianceRequest) -> SimResult<Vec<RawSample>> {
        let url = format!("{}/seriescalc", self.base_url);
        debug!(
            url = %url,
            lat = request.location.latitude,
            lon = request.location.longitude,
            "Fetching hourly radiation from PVGIS"
        );

        let response = self
            .client
            .get(&url)
            .query(&self.query(request))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "PVGIS request failed");
                SimulationError::data_unavailable(format!("PVGIS unreachable: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<PvgisError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            error!(%status, message = %message, "PVGIS returned error status");
            return Err(SimulationError::data_unavailable(format!(
                "PVGIS error {status}: {message}"
            )));
        }

        let body: PvgisResponse = response.json().await.map_err(|e| {
            SimulationError::data_unavailable(format!("Failed to parse PVGIS response: {e}"))
        })?;

        let samples = parse_hourly(body.outputs.hourly);
        if samples.is_empty() {
            return Err(SimulationError::data_unavailable(
                "PVGIS returned no hourly data for the location",
            ));
        }

        info!(samples = samples.len(), "Fetched hourly radiation from PVGIS");
        Ok(samples)
    }
}

fn parse_hourly(rows: Vec<PvgisHourly>) -> Vec<RawSample> {
    let mut skipped = 0usize;
    let samples = rows
        .into_iter()
        .filter_map(|row| match NaiveDateTime::parse_from_str(&row.time, TIME_FORMAT) {
            Ok(timestamp) => Some(RawSample {
                timestamp,
                irradiance_w_m2: row.global(),
                beam_w_m2: row.beam,
                temperature_c: row.temperature,
            }),
            Err(_) => {
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        warn!(skipped, "Skipped PVGIS rows with unparseable timestamps");
    }
    samples
}

#[derive(Debug, Deserialize)]
struct PvgisResponse {
    outputs: PvgisOutputs,
}

#[derive(Debug, Deserialize)]
struct PvgisOutputs {
    #[serde(default)]
    hourly: Vec<PvgisHourly>,
}

#[derive(Debug, Deserialize)]
struct PvgisHourly {
    time: String,
    #[serde(rename = "G(i)")]
    irradiance: Option<f64>,
    #[serde(rename = "Gb(i)")]
    beam: Option<f64>,
    #[serde(rename = "Gd(i)")]
    diffuse: Option<f64>,
    #[serde(rename = "Gr(i)")]
    reflected: Option<f64>,
    #[serde(rename = "T2m")]
    temperature: Option<f64>,
}

impl PvgisHourly {
    fn global(&self) -> Option<f64> {
        self.irradiance.or(match (self.beam, self.diffuse, self.reflected) {
            (Some(b), Some(d), Some(r)) => Some(b + d + r),
            _ => None,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PvgisError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, Orientation};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            base_url,
            timeout_seconds: 5,
            max_retries: 1,
            backoff_min_ms: 1,
            backoff_max_ms: 2,
            start_year: 2020,
            end_year: 2020,
        }
    }

    fn request() -> IrradianceRequest {
        IrradianceRequest::new(Location::new(52.52, 13.405), Orientation::new(-15.0, 30.0))
    }

    #[tokio::test]
    async fn test_parses_hourly_rows() {
        let server = MockServer::start().await;
        let body = json!({
            "inputs": {},
            "outputs": {
                "hourly": [
                    {"time": "20200101:0010", "Gb(i)": 0.0, "Gd(i)": 0.0, "Gr(i)": 0.0, "T2m": -1.5, "H_sun": 0.0, "WS10m": 2.1, "Int": 0.0},
                    {"time": "20200101:1110", "Gb(i)": 210.0, "Gd(i)": 100.4, "Gr(i)": 2.0, "T2m": 3.2, "H_sun": 14.0, "WS10m": 3.0, "Int": 0.0},
                    {"time": "20200101:1210", "G(i)": 280.0, "T2m": 3.5},
                    {"time": "bogus", "Gb(i)": 1.0, "Gd(i)": 1.0, "Gr(i)": 0.0, "T2m": 1.0}
                ]
            },
            "meta": {}
        });
        Mock::given(method("GET"))
            .and(path("/seriescalc"))
            .and(query_param("angle", "30.0"))
            .and(query_param("aspect", "-15.0"))
            .and(query_param("pvcalculation", "0"))
            .and(query_param("components", "1"))
            .and(query_param("outputformat", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let provider = PvgisProvider::new(&config(server.uri())).unwrap();
        let samples = provider.fetch(&request()).await.unwrap();

        assert_eq!(samples.len(), 3);
        assert!((samples[1].irradiance_w_m2.unwrap() - 312.4).abs() < 1e-9);
        assert_eq!(samples[1].beam_w_m2, Some(210.0));
        assert_eq!(samples[1].temperature_c, Some(3.2));
        assert_eq!(samples[2].irradiance_w_m2, Some(280.0));
        assert_eq!(samples[2].beam_w_m2, None);
        assert_eq!(
            samples[1].timestamp,
            NaiveDateTime::parse_from_str("20200101:1110", TIME_FORMAT).unwrap()
        );
    }

    #[tokio::test]
    async fn test_server_error_after_retries_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seriescalc"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let provider = PvgisProvider::new(&config(server.uri())).unwrap();
        let err = provider.fetch(&request()).await.unwrap_err();
        assert!(matches!(err, SimulationError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_location_error_message_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seriescalc"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"message": "Location over the sea. Please, select another location", "status": 400})),
            )
            .mount(&server)
            .await;

        let provider = PvgisProvider::new(&config(server.uri())).unwrap();
        let err = provider.fetch(&request()).await.unwrap_err();
        assert!(err.to_string().contains("over the sea"));
    }

    #[tokio::test]
    async fn test_empty_hourly_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/seriescalc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outputs": {"hourly": []}})))
            .mount(&server)
            .await;

        let provider = PvgisProvider::new(&config(server.uri())).unwrap();
        assert!(matches!(
            provider.fetch(&request()).await,
            Err(SimulationError::DataUnavailable(_))
        ));
    }
}
