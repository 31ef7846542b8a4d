//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::engine::WeatherOrchestrator;
use crate::types::{AlertSeverity, LocationKey, WeatherAlert, WeatherRecord};

/// Alerts kept for `/api/monitor`.
const MAX_RECENT_ALERTS: usize = 50;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub orchestrator: WeatherOrchestrator,
    pub monitor: RwLock<MonitorStatus>,
}

impl DashboardState {
    pub fn new(orchestrator: WeatherOrchestrator) -> Self {
        Self {
            orchestrator,
            monitor: RwLock::new(MonitorStatus::default()),
        }
    }

    /// Mark a monitoring cycle as started.
    pub async fn begin_check(&self) {
        self.monitor.write().await.status = CheckStatus::Checking;
    }

    /// Mark a monitoring cycle as finished and record any new alerts.
    pub async fn finish_check(&self, success: bool, checked_at: String, alerts: Vec<AlertLogEntry>) {
        let mut monitor = self.monitor.write().await;
        monitor.cycles += 1;
        if success {
            monitor.status = CheckStatus::Success;
            monitor.last_checked = Some(checked_at);
        } else {
            monitor.status = CheckStatus::Error;
        }
        monitor.recent_alerts.extend(alerts);
        let excess = monitor.recent_alerts.len().saturating_sub(MAX_RECENT_ALERTS);
        monitor.recent_alerts.drain(..excess);
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[default]
    Idle,
    Checking,
    Success,
    Error,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatus {
    pub status: CheckStatus,
    pub last_checked: Option<String>,
    pub cycles: u64,
    pub recent_alerts: Vec<AlertLogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertLogEntry {
    pub location: LocationKey,
    pub severity: AlertSeverity,
    pub title: String,
    pub last_updated: String,
}

impl AlertLogEntry {
    pub fn new(record: &WeatherRecord, alert: &WeatherAlert) -> Self {
        Self {
            location: record.location,
            severity: alert.severity,
            title: alert.title.clone(),
            last_updated: record.last_updated.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    pub key: LocationKey,
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub alerts_url: &'static str,
    pub minute_forecast_url: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherResponse {
    #[serde(flatten)]
    pub record: WeatherRecord,
    /// Seconds until a stale record is worth refreshing.
    pub refresh_in_secs: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationResult {
    pub location: LocationKey,
    pub record: Option<WeatherRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResponse {
    pub rate_limited: bool,
    pub resets_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// GET /api/locations
pub async fn get_locations() -> Json<Vec<LocationInfo>> {
    Json(
        LocationKey::ALL
            .iter()
            .map(|&key| {
                let (latitude, longitude) = key.coordinates();
                LocationInfo {
                    key,
                    name: key.name(),
                    latitude,
                    longitude,
                    alerts_url: key.alerts_url(),
                    minute_forecast_url: key.minute_forecast_url(),
                }
            })
            .collect(),
    )
}

/// GET /api/weather/:location?refresh=bool
pub async fn get_weather(
    State(state): State<AppState>,
    Path(location): Path<String>,
    Query(params): Query<RefreshQuery>,
) -> Response {
    let location: LocationKey = match location.parse() {
        Ok(location) => location,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e.to_string()),
    };

    match state.orchestrator.get_weather(location, params.refresh).await {
        Ok(record) => {
            let refresh_in_secs = state
                .orchestrator
                .refresh_countdown(&record, chrono::Utc::now())
                .map(|d| d.num_seconds());
            Json(WeatherResponse {
                record,
                refresh_in_secs,
            })
            .into_response()
        }
        Err(e) => {
            warn!(location = %location, error = %e, "Weather request failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

/// GET /api/weather?refresh=bool
pub async fn get_all_weather(
    State(state): State<AppState>,
    Query(params): Query<RefreshQuery>,
) -> Json<Vec<LocationResult>> {
    let results = state.orchestrator.get_all(params.refresh).await;
    Json(
        results
            .into_iter()
            .map(|(location, result)| match result {
                Ok(record) => LocationResult {
                    location,
                    record: Some(record),
                    error: None,
                },
                Err(e) => LocationResult {
                    location,
                    record: None,
                    error: Some(e.to_string()),
                },
            })
            .collect(),
    )
}

/// GET /api/rate-limit
pub async fn get_rate_limit(State(state): State<AppState>) -> Json<RateLimitResponse> {
    let rate_limited = state.orchestrator.is_rate_limited();
    Json(RateLimitResponse {
        rate_limited,
        resets_at: state
            .orchestrator
            .rate_limit_resets_at()
            .filter(|_| rate_limited)
            .map(|t| t.to_rfc3339()),
    })
}

/// GET /api/monitor
pub async fn get_monitor(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.monitor.read().await.clone())
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
