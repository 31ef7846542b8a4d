//! Shared types for the SQUALL weather backend.
//!
//! These types form the data model handed from the orchestrator to the
//! dashboard. `WeatherRecord` is the unit that is cached, served and
//! rendered; everything else hangs off it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// One of the fixed set of supported locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKey {
    Fredericton,
    Moncton,
    McGivney,
}

impl LocationKey {
    /// All supported locations, in dashboard tab order.
    pub const ALL: &'static [LocationKey] = &[
        LocationKey::Fredericton,
        LocationKey::Moncton,
        LocationKey::McGivney,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LocationKey::Fredericton => "Fredericton",
            LocationKey::Moncton => "Moncton",
            LocationKey::McGivney => "McGivney",
        }
    }

    /// (latitude, longitude)
    pub fn coordinates(&self) -> (f64, f64) {
        match self {
            LocationKey::Fredericton => (45.9636, -66.6431),
            LocationKey::Moncton => (46.0878, -64.7782),
            LocationKey::McGivney => (46.2501, -66.3154),
        }
    }

    /// Official alerts page, used as the attribution link when AI analysis is paused.
    pub fn alerts_url(&self) -> &'static str {
        match self {
            LocationKey::Fredericton => {
                "https://www.theweathernetwork.com/en/city/ca/new-brunswick/fredericton/alerts"
            }
            LocationKey::Moncton => {
                "https://www.theweathernetwork.com/en/city/ca/new-brunswick/moncton/alerts"
            }
            LocationKey::McGivney => {
                "https://www.theweathernetwork.com/en/city/ca/new-brunswick/mcgivney/alerts"
            }
        }
    }

    /// Minute-by-minute precipitation page for the location.
    pub fn minute_forecast_url(&self) -> &'static str {
        match self {
            LocationKey::Fredericton => {
                "https://www.accuweather.com/en/ca/fredericton/e3b/minute-weather-forecast/1001"
            }
            LocationKey::Moncton => {
                "https://www.accuweather.com/en/ca/moncton/e1c/minute-weather-forecast/49417"
            }
            LocationKey::McGivney => {
                "https://www.accuweather.com/en/ca/mcgivney/e6c/minute-weather-forecast/54315"
            }
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a location name (case-insensitive).
impl FromStr for LocationKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fredericton" => Ok(LocationKey::Fredericton),
            "moncton" => Ok(LocationKey::Moncton),
            "mcgivney" => Ok(LocationKey::McGivney),
            _ => Err(anyhow::anyhow!("Unknown location: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// WMO weather codes
// ---------------------------------------------------------------------------

/// Condition string for unmapped weather codes.
pub const UNKNOWN_CONDITION: &str = "Unknown";

/// Map a WMO weather code to a human-readable condition.
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn wmo_condition(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => UNKNOWN_CONDITION,
    }
}

// ---------------------------------------------------------------------------
// AI-derived enums
// ---------------------------------------------------------------------------
//
// Each enum parses case-insensitively and its `Default` is the safe value
// that invalid provider output coerces to.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AlertSeverity {
    #[default]
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl FromStr for AlertSeverity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minor" => Ok(AlertSeverity::Minor),
            "moderate" => Ok(AlertSeverity::Moderate),
            "severe" => Ok(AlertSeverity::Severe),
            "extreme" => Ok(AlertSeverity::Extreme),
            _ => Err(anyhow::anyhow!("Unknown alert severity: {s}")),
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Minor => write!(f, "Minor"),
            AlertSeverity::Moderate => write!(f, "Moderate"),
            AlertSeverity::Severe => write!(f, "Severe"),
            AlertSeverity::Extreme => write!(f, "Extreme"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoadStatus {
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl FromStr for RoadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "good" => Ok(RoadStatus::Good),
            "fair" => Ok(RoadStatus::Fair),
            "poor" => Ok(RoadStatus::Poor),
            "unknown" => Ok(RoadStatus::Unknown),
            _ => Err(anyhow::anyhow!("Unknown road status: {s}")),
        }
    }
}

/// Severity of a day in the significant-weather outlook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum EventSeverity {
    #[default]
    None,
    Moderate,
    High,
}

impl FromStr for EventSeverity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(EventSeverity::None),
            "moderate" => Ok(EventSeverity::Moderate),
            "high" => Ok(EventSeverity::High),
            _ => Err(anyhow::anyhow!("Unknown event severity: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Morning,
    Afternoon,
    Overnight,
}

impl Period {
    /// Periods in outlook order.
    pub const ALL: &'static [Period] = &[Period::Morning, Period::Afternoon, Period::Overnight];
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" => Ok(Period::Morning),
            "afternoon" => Ok(Period::Afternoon),
            "overnight" => Ok(Period::Overnight),
            _ => Err(anyhow::anyhow!("Unknown period: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecipType {
    Rain,
    Snow,
    Ice,
    Mix,
    #[default]
    None,
}

impl FromStr for PrecipType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rain" => Ok(PrecipType::Rain),
            "snow" => Ok(PrecipType::Snow),
            "ice" => Ok(PrecipType::Ice),
            "mix" => Ok(PrecipType::Mix),
            "none" => Ok(PrecipType::None),
            _ => Err(anyhow::anyhow!("Unknown precipitation type: {s}")),
        }
    }
}

/// Outcome of the AI-inference call for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiStatus {
    Active,
    RateLimited,
    Failed,
}

impl fmt::Display for AiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiStatus::Active => write!(f, "active"),
            AiStatus::RateLimited => write!(f, "rate_limited"),
            AiStatus::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inferred outlook (validated AI payload)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadConditions {
    pub status: RoadStatus,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantWeatherEvent {
    pub day: String,
    pub severity: EventSeverity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodOutlook {
    pub period: Period,
    pub day: String,
    pub temp: String,
    pub condition: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteCastEntry {
    pub time: String,
    /// 0.0 (none) to 1.0 (heavy)
    pub intensity: f64,
    #[serde(rename = "type")]
    pub precip_type: PrecipType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteCast {
    pub summary: String,
    pub data: Vec<MinuteCastEntry>,
}

/// The validated AI-derived part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredOutlook {
    pub alerts: Vec<WeatherAlert>,
    /// 0–100
    pub snow_day_probability: f64,
    pub snow_day_reasoning: String,
    /// 0–100
    pub power_outage_probability: f64,
    pub power_outage_reasoning: String,
    pub road_conditions: RoadConditions,
    pub significant_weather: Vec<SignificantWeatherEvent>,
    pub period_outlooks: Vec<PeriodOutlook>,
    pub minute_cast: MinuteCast,
}

/// Attribution link returned by the search-grounding step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Forecast series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    /// Hour label, e.g. "3pm"
    pub time: String,
    pub temp: i32,
    pub condition: String,
    pub precip_prob: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// "Today", "Tomorrow", then weekday names
    pub day: String,
    pub high: i32,
    pub low: i32,
    pub condition: String,
    pub precip_prob: u8,
}

// ---------------------------------------------------------------------------
// Weather record
// ---------------------------------------------------------------------------

/// Merged per-location record: numerical forecast + validated AI outlook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location: LocationKey,
    pub city_name: String,
    pub station_name: String,
    pub current_temp: i32,
    pub feels_like: i32,
    pub condition: String,
    pub high: i32,
    pub low: i32,
    pub humidity: f64,
    pub wind_speed: i32,
    pub outlook: InferredOutlook,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
    pub sources: Vec<Source>,
    /// Human-readable, in the display timezone
    pub last_updated: String,
    pub is_stale: bool,
    /// Epoch millis
    pub cache_timestamp: i64,
    pub ai_status: AiStatus,
}

impl WeatherRecord {
    /// Helper to build a test record with sensible defaults.
    #[cfg(test)]
    pub fn sample(location: LocationKey, cache_timestamp: i64) -> Self {
        WeatherRecord {
            location,
            city_name: location.name().to_string(),
            station_name: "Lat 46.09, Lon -64.78".to_string(),
            current_temp: -8,
            feels_like: -15,
            condition: "Moderate snow fall".to_string(),
            high: -5,
            low: -15,
            humidity: 81.0,
            wind_speed: 22,
            outlook: InferredOutlook {
                alerts: vec![WeatherAlert {
                    severity: AlertSeverity::Moderate,
                    title: "Snowfall warning".to_string(),
                    description: "15 to 25 cm of snow expected.".to_string(),
                }],
                snow_day_probability: 70.0,
                snow_day_reasoning: "Heavy overnight accumulation.".to_string(),
                power_outage_probability: 20.0,
                power_outage_reasoning: "Moderate winds.".to_string(),
                road_conditions: RoadConditions {
                    status: RoadStatus::Poor,
                    summary: "Snow covered.".to_string(),
                },
                significant_weather: Vec::new(),
                period_outlooks: Vec::new(),
                minute_cast: MinuteCast {
                    summary: "Snow continuing.".to_string(),
                    data: Vec::new(),
                },
            },
            hourly: Vec::new(),
            daily: Vec::new(),
            sources: Vec::new(),
            last_updated: "Jan 15, 2026, 9:15 a.m.".to_string(),
            is_stale: false,
            cache_timestamp,
            ai_status: AiStatus::Active,
        }
    }
}

impl fmt::Display for WeatherRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}°C (feels {}°C), {} | snow day {:.0}% | outage {:.0}% | ai: {}{}",
            self.city_name,
            self.current_temp,
            self.feels_like,
            self.condition,
            self.outlook.snow_day_probability,
            self.outlook.power_outage_probability,
            self.ai_status,
            if self.is_stale { " (stale)" } else { "" },
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the orchestrator.
///
/// `Clone` so that one failed fetch can be handed to every caller that
/// joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeatherError {
    #[error("No weather data available for {location}: {reason}")]
    NoData { location: LocationKey, reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
