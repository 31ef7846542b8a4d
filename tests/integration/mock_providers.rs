//! Fake providers for integration testing.
//!
//! Deterministic `ForecastProvider` and `InferenceProvider` implementations
//! that count their calls, can be told to fail, and can be slowed down so
//! concurrent callers overlap. All state is in-memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use squall::cache::{cache_key, Cache, CacheEntry, MemoryCache, DEFAULT_SCHEMA_VERSION};
use squall::engine::{OrchestratorSettings, WeatherOrchestrator};
use squall::forecast::{CurrentConditions, DailySeries, ForecastProvider, HourlySeries, RawForecastSnapshot};
use squall::inference::{
    GroundedResponse, InferenceError, InferenceProvider, InferenceService, OutlookRequest,
    RateLimiter, RawOutlook,
};
use squall::types::*;

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

/// 48 hourly entries from midnight 2026-01-15, current time 09:15, so the
/// first entry at or after now is index 10. Hourly precipitation
/// probability equals the entry index.
pub fn snapshot() -> RawForecastSnapshot {
    RawForecastSnapshot {
        latitude: 46.09,
        longitude: -64.78,
        current: CurrentConditions {
            time: "2026-01-15T09:15".to_string(),
            temperature_2m: -6.8,
            relative_humidity_2m: 77.0,
            weather_code: 75,
            wind_speed_10m: 31.6,
            apparent_temperature: -15.2,
        },
        hourly: HourlySeries {
            time: (0..48)
                .map(|h| format!("2026-01-{:02}T{:02}:00", 15 + h / 24, h % 24))
                .collect(),
            temperature_2m: (0..48).map(|h| Some(-12.0 + h as f64 * 0.5)).collect(),
            precipitation_probability: (0..48).map(|h| Some(h as f64)).collect(),
            weather_code: (0..48).map(|_| Some(75)).collect(),
        },
        daily: DailySeries {
            time: (0..7).map(|d| format!("2026-01-{:02}", 15 + d)).collect(),
            weather_code: vec![Some(75); 7],
            temperature_2m_max: (0..7).map(|d| Some(-4.0 + d as f64)).collect(),
            temperature_2m_min: (0..7).map(|d| Some(-16.0 + d as f64)).collect(),
            precipitation_probability_max: vec![Some(95.0); 7],
        },
    }
}

pub struct FakeForecast {
    calls: AtomicUsize,
    delay: std::time::Duration,
    error: Mutex<Option<String>>,
}

impl FakeForecast {
    pub fn new() -> Self {
        Self::with_delay(std::time::Duration::ZERO)
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            error: Mutex::new(None),
        }
    }

    /// Make all subsequent fetches fail.
    pub fn set_error(&self, msg: &str) {
        *self.error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastProvider for FakeForecast {
    async fn fetch_forecast(&self, _location: LocationKey) -> Result<RawForecastSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(msg) = self.error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        Ok(snapshot())
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum Behaviour {
    Respond(RawOutlook),
    RateLimited,
    Fail,
}

pub struct FakeInference {
    calls: AtomicUsize,
    delay: std::time::Duration,
    behaviour: Mutex<Behaviour>,
    requests: Mutex<Vec<OutlookRequest>>,
}

impl FakeInference {
    pub fn new(behaviour: Behaviour) -> Self {
        Self::with_delay(behaviour, std::time::Duration::ZERO)
    }

    pub fn with_delay(behaviour: Behaviour, delay: std::time::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            behaviour: Mutex::new(behaviour),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OutlookRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceProvider for FakeInference {
    async fn generate_outlook(
        &self,
        request: &OutlookRequest,
    ) -> std::result::Result<GroundedResponse, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let behaviour = self.behaviour.lock().unwrap().clone();
        match behaviour {
            Behaviour::Respond(outlook) => Ok(GroundedResponse {
                outlook,
                sources: vec![Source {
                    uri: "https://weather.gc.ca/warnings/index_e.html?prov=nb".to_string(),
                    title: "Environment Canada".to_string(),
                }],
            }),
            Behaviour::RateLimited => Err(InferenceError::Http {
                status: 429,
                body: "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
            }),
            Behaviour::Fail => Err(InferenceError::Http {
                status: 500,
                body: "internal error".to_string(),
            }),
        }
    }
}

/// A well-formed outlook with one alert.
pub fn good_outlook() -> RawOutlook {
    serde_json::from_value(json!({
        "alerts": [{ "severity": "Severe", "title": "Winter storm warning", "description": "25 cm." }],
        "snowDayProbability": 85,
        "snowDayReasoning": "Heavy overnight snow.",
        "powerOutageProbability": 35,
        "powerOutageReasoning": "Gusts to 60 km/h.",
        "roadConditions": { "status": "Poor", "summary": "Snow covered." },
        "significantWeather": [{ "day": "Today", "severity": "High", "description": "Snowstorm" }],
        "periodOutlooks": [
            { "period": "Morning", "day": "Thu", "temp": "-7", "condition": "Snow", "summary": "Heavy snow." }
        ],
        "minuteCast": { "summary": "Snow for the next hour.", "data": [{ "time": "9:20am", "intensity": 0.7, "type": "snow" }] }
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: WeatherOrchestrator,
    pub forecast: Arc<FakeForecast>,
    pub inference: Arc<FakeInference>,
    pub cache: Arc<dyn Cache>,
    pub limiter: Arc<RateLimiter>,
}

impl Harness {
    pub fn new(forecast: FakeForecast, inference: FakeInference) -> Self {
        Self::with_cache(forecast, inference, Arc::new(MemoryCache::new()), OrchestratorSettings::default())
    }

    pub fn with_cache(
        forecast: FakeForecast,
        inference: FakeInference,
        cache: Arc<dyn Cache>,
        settings: OrchestratorSettings,
    ) -> Self {
        let forecast = Arc::new(forecast);
        let inference = Arc::new(inference);
        let limiter = Arc::new(RateLimiter::default());
        let service = InferenceService::new(
            inference.clone(),
            limiter.clone(),
            std::time::Duration::from_secs(30),
        );
        let orchestrator = WeatherOrchestrator::new(forecast.clone(), service, cache.clone(), settings);
        Self {
            orchestrator,
            forecast,
            inference,
            cache,
            limiter,
        }
    }

    /// Store a record for `location` written `age` ago. Returns its timestamp.
    pub fn seed(&self, location: LocationKey, age: Duration) -> i64 {
        let written = Utc::now() - age;
        let entry = CacheEntry::new(record(location, written), written);
        self.cache.set(&cache_key(DEFAULT_SCHEMA_VERSION, location), &entry);
        entry.timestamp
    }
}

/// A complete cached record, distinguishable by its 42% snow-day figure.
pub fn record(location: LocationKey, written: DateTime<Utc>) -> WeatherRecord {
    WeatherRecord {
        location,
        city_name: location.name().to_string(),
        station_name: "Lat 46.09, Lon -64.78".to_string(),
        current_temp: -3,
        feels_like: -9,
        condition: "Overcast".to_string(),
        high: -1,
        low: -11,
        humidity: 70.0,
        wind_speed: 18,
        outlook: InferredOutlook {
            alerts: Vec::new(),
            snow_day_probability: 42.0,
            snow_day_reasoning: "Cached.".to_string(),
            power_outage_probability: 5.0,
            power_outage_reasoning: "Cached.".to_string(),
            road_conditions: RoadConditions {
                status: RoadStatus::Fair,
                summary: "Wet in places.".to_string(),
            },
            significant_weather: Vec::new(),
            period_outlooks: Vec::new(),
            minute_cast: MinuteCast {
                summary: String::new(),
                data: Vec::new(),
            },
        },
        hourly: Vec::new(),
        daily: Vec::new(),
        sources: Vec::new(),
        last_updated: "Jan 15, 2026, 8:55 a.m.".to_string(),
        is_stale: false,
        cache_timestamp: written.timestamp_millis(),
        ai_status: AiStatus::Active,
    }
}
