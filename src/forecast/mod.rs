//! Numerical forecast provider.
//!
//! Defines the `ForecastProvider` trait and the raw snapshot shape it
//! returns. The snapshot mirrors the Open-Meteo response: a `current`
//! object plus `hourly`/`daily` series stored as parallel arrays.

pub mod open_meteo;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::LocationKey;

/// Abstraction over the deterministic forecast source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Fetch current conditions plus hourly and daily series for a location.
    /// Non-success responses and timeouts are errors; there is no retry.
    async fn fetch_forecast(&self, location: LocationKey) -> Result<RawForecastSnapshot>;
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecastSnapshot {
    /// Grid point actually used by the provider.
    pub latitude: f64,
    pub longitude: f64,
    pub current: CurrentConditions,
    #[serde(default)]
    pub hourly: HourlySeries,
    #[serde(default)]
    pub daily: DailySeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Local time in the requested timezone, e.g. "2026-01-15T09:15".
    pub time: String,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub weather_code: i32,
    pub wind_speed_10m: f64,
    pub apparent_temperature: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    pub weather_code: Vec<Option<i32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    /// Local dates, e.g. "2026-01-15".
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub weather_code: Vec<Option<i32>>,
    #[serde(default)]
    pub temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability_max: Vec<Option<f64>>,
}

impl RawForecastSnapshot {
    /// A 48-hour / 7-day snapshot starting at midnight 2026-01-15, with the
    /// current time at 09:15 so that hourly entry 10 is the first one ahead.
    #[cfg(test)]
    pub fn sample() -> Self {
        let hourly_time: Vec<String> = (0..48)
            .map(|h| format!("2026-01-{:02}T{:02}:00", 15 + h / 24, h % 24))
            .collect();
        let daily_time: Vec<String> = (0..7).map(|d| format!("2026-01-{:02}", 15 + d)).collect();

        RawForecastSnapshot {
            latitude: 46.09,
            longitude: -64.78,
            current: CurrentConditions {
                time: "2026-01-15T09:15".to_string(),
                temperature_2m: -7.6,
                relative_humidity_2m: 81.0,
                weather_code: 73,
                wind_speed_10m: 22.4,
                apparent_temperature: -14.5,
            },
            hourly: HourlySeries {
                temperature_2m: (0..48).map(|h| Some(-10.0 + h as f64 * 0.25)).collect(),
                precipitation_probability: (0..48).map(|h| Some((h * 2) as f64)).collect(),
                weather_code: (0..48).map(|_| Some(73)).collect(),
                time: hourly_time,
            },
            daily: DailySeries {
                weather_code: vec![Some(73), Some(75), Some(3), Some(0), Some(61), Some(71), None],
                temperature_2m_max: (0..7).map(|d| Some(-5.0 + d as f64)).collect(),
                temperature_2m_min: (0..7).map(|d| Some(-15.0 + d as f64)).collect(),
                precipitation_probability_max: (0..7).map(|d| Some(90.0 - d as f64 * 10.0)).collect(),
                time: daily_time,
            },
        }
    }
}
