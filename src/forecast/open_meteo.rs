//! Open-Meteo forecast client.
//!
//! Uses the free Open-Meteo API (no key required) for current conditions,
//! a 48-hour hourly series and a 7-day daily series.
//!
//! API: `https://api.open-meteo.com/v1/forecast`
//! Auth: None required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{ForecastProvider, RawForecastSnapshot};
use crate::config::ForecastConfig;
use crate::types::LocationKey;

const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m,apparent_temperature";
const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,weather_code";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max";

pub struct OpenMeteoClient {
    http: Client,
    base_url: String,
    timezone: String,
    forecast_days: u8,
}

impl OpenMeteoClient {
    /// Build a client. `timeout` bounds the whole request; exceeding it is
    /// reported as a provider failure.
    pub fn new(base_url: &str, timeout: Duration, timezone: &str, forecast_days: u8) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SQUALL/0.1.0")
            .build()
            .context("Failed to build Open-Meteo HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timezone: timezone.to_string(),
            forecast_days,
        })
    }

    pub fn from_config(cfg: &ForecastConfig, timezone: &str) -> Result<Self> {
        Self::new(
            &cfg.base_url,
            Duration::from_secs(cfg.timeout_secs),
            timezone,
            cfg.forecast_days,
        )
    }

    fn forecast_url(&self) -> String {
        format!("{}/v1/forecast", self.base_url)
    }

    fn query_params(&self, location: LocationKey) -> Vec<(&'static str, String)> {
        let (lat, lon) = location.coordinates();
        vec![
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("daily", DAILY_FIELDS.to_string()),
            ("timezone", self.timezone.clone()),
            ("forecast_days", self.forecast_days.to_string()),
        ]
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoClient {
    async fn fetch_forecast(&self, location: LocationKey) -> Result<RawForecastSnapshot> {
        let resp = self
            .http
            .get(self.forecast_url())
            .query(&self.query_params(location))
            .send()
            .await
            .with_context(|| format!("Open-Meteo request failed for {location}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Open-Meteo API error: {status}");
        }

        let snapshot: RawForecastSnapshot = resp
            .json()
            .await
            .context("Failed to parse Open-Meteo response")?;

        debug!(
            location = %location,
            hourly = snapshot.hourly.time.len(),
            daily = snapshot.daily.time.len(),
            "Open-Meteo forecast received"
        );

        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
