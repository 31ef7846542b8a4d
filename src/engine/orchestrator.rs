//! Weather data orchestrator.
//!
//! Produces one `WeatherRecord` per location. The policy, in order:
//! serve a fresh cache entry; during an inference cooldown serve whatever is
//! cached as stale; otherwise join or start a single-flight fetch that
//! calls the forecast provider, then the inference wrapper, merges the two,
//! and persists the result. A failed fetch falls back to the last cached
//! record, and only fails outright when nothing was ever cached.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::merge::{assemble_record, round};
use super::single_flight::SingleFlight;
use crate::cache::{cache_key, Cache, CacheEntry, DEFAULT_SCHEMA_VERSION};
use crate::config::AppConfig;
use crate::forecast::ForecastProvider;
use crate::inference::{InferenceService, RateLimiter};
use crate::types::{wmo_condition, AiStatus, LocationKey, WeatherError, WeatherRecord};

/// Default freshness window for cached records.
pub const DEFAULT_CACHE_TTL_MINS: i64 = 15;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub cache_ttl: Duration,
    pub schema_version: String,
    pub timezone: Tz,
    /// Locations covered by `get_all`.
    pub locations: Vec<LocationKey>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::minutes(DEFAULT_CACHE_TTL_MINS),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            timezone: chrono_tz::America::Moncton,
            locations: LocationKey::ALL.to_vec(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            cache_ttl: Duration::minutes(config.cache.ttl_mins),
            schema_version: config.cache.schema_version.clone(),
            timezone: config.timezone().context("Invalid display timezone")?,
            locations: config.monitor.locations.clone(),
        })
    }
}

/// Running counters, for cycle summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub cache_hits: u64,
    pub fetches: u64,
    pub stale_served: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    fetches: AtomicU64,
    stale_served: AtomicU64,
    failures: AtomicU64,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Cheap to clone; clones share cache, cooldown and in-flight fetches.
#[derive(Clone)]
pub struct WeatherOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    forecast: Arc<dyn ForecastProvider>,
    inference: InferenceService,
    limiter: Arc<RateLimiter>,
    cache: Arc<dyn Cache>,
    settings: OrchestratorSettings,
    flights: SingleFlight<LocationKey, Result<WeatherRecord, WeatherError>>,
    counters: Counters,
}

impl WeatherOrchestrator {
    /// The cooldown is shared with the inference wrapper.
    pub fn new(
        forecast: Arc<dyn ForecastProvider>,
        inference: InferenceService,
        cache: Arc<dyn Cache>,
        settings: OrchestratorSettings,
    ) -> Self {
        let limiter = Arc::clone(inference.limiter());
        Self {
            inner: Arc::new(Inner {
                forecast,
                inference,
                limiter,
                cache,
                settings,
                flights: SingleFlight::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Get the record for a location.
    ///
    /// `force_refresh` bypasses the fresh-cache shortcut but not the
    /// cooldown: while inference is rate limited any cached record is
    /// returned as stale instead of fetching.
    pub async fn get_weather(
        &self,
        location: LocationKey,
        force_refresh: bool,
    ) -> Result<WeatherRecord, WeatherError> {
        let inner = &self.inner;
        let cached = inner.cache.get(&inner.key(location));

        if let Some(entry) = &cached {
            if !force_refresh && entry.is_fresh(inner.settings.cache_ttl, Utc::now()) {
                debug!(location = %location, age_secs = entry.age(Utc::now()).num_seconds(), "Cache hit");
                inner.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(from_cache(entry.clone(), false, None));
            }
        }

        if inner.limiter.is_active() {
            if let Some(entry) = cached {
                info!(location = %location, "Inference cooldown active, serving cached record");
                inner.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                return Ok(from_cache(entry, true, Some(AiStatus::RateLimited)));
            }
        }

        let fetcher = Arc::clone(inner);
        inner
            .flights
            .run(location, move || async move { fetcher.fetch(location).await })
            .await
    }

    /// Fetch every configured location in turn.
    pub async fn get_all(
        &self,
        force_refresh: bool,
    ) -> Vec<(LocationKey, Result<WeatherRecord, WeatherError>)> {
        let mut results = Vec::with_capacity(self.inner.settings.locations.len());
        for &location in &self.inner.settings.locations {
            results.push((location, self.get_weather(location, force_refresh).await));
        }
        results
    }

    /// Time left before a stale record's cache entry expires and a refresh
    /// is worth trying. `None` for fresh records.
    pub fn refresh_countdown(&self, record: &WeatherRecord, now: DateTime<Utc>) -> Option<Duration> {
        if !record.is_stale {
            return None;
        }
        let age = Duration::milliseconds(now.timestamp_millis() - record.cache_timestamp);
        Some((self.inner.settings.cache_ttl - age).max(Duration::zero()))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.inner.limiter.is_active()
    }

    pub fn rate_limit_resets_at(&self) -> Option<DateTime<Utc>> {
        self.inner.limiter.resets_at()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.inner.settings.cache_ttl
    }

    pub fn locations(&self) -> &[LocationKey] {
        &self.inner.settings.locations
    }

    pub fn stats(&self) -> OrchestratorStats {
        let c = &self.inner.counters;
        OrchestratorStats {
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            stale_served: c.stale_served.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn key(&self, location: LocationKey) -> String {
        cache_key(&self.settings.schema_version, location)
    }

    async fn fetch(&self, location: LocationKey) -> Result<WeatherRecord, WeatherError> {
        info!(location = %location, "Fetching weather");
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);

        let snapshot = match self.forecast.fetch_forecast(location).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(location = %location, error = %e, "Forecast fetch failed");
                return self.fallback(location, format!("{e:#}"));
            }
        };

        let current_temp = round(snapshot.current.temperature_2m);
        let condition = wmo_condition(snapshot.current.weather_code);
        let outcome = self.inference.query(location, current_temp, condition).await;

        let now = Utc::now();
        let record = assemble_record(location, &snapshot, outcome, now, self.settings.timezone);
        self.cache.set(&self.key(location), &CacheEntry::new(record.clone(), now));

        info!(
            location = %location,
            ai_status = ?record.ai_status,
            temp = record.current_temp,
            alerts = record.outlook.alerts.len(),
            "Weather record refreshed"
        );
        Ok(record)
    }

    fn fallback(&self, location: LocationKey, reason: String) -> Result<WeatherRecord, WeatherError> {
        match self.cache.get(&self.key(location)) {
            Some(entry) => {
                info!(location = %location, cached_at = entry.timestamp, "Serving stale cached record");
                self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                Ok(from_cache(entry, true, None))
            }
            None => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(WeatherError::NoData { location, reason })
            }
        }
    }
}

/// A cached record as served: staleness set, stored timestamp restored.
fn from_cache(entry: CacheEntry, is_stale: bool, ai_status: Option<AiStatus>) -> WeatherRecord {
    let mut record = entry.data;
    record.is_stale = is_stale;
    record.cache_timestamp = entry.timestamp;
    if let Some(status) = ai_status {
        record.ai_status = status;
    }
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
