//! Generative, search-grounded inference.
//!
//! Defines the `InferenceProvider` trait, the loosely-typed `RawOutlook`
//! payload it returns, and `InferenceService`: the wrapper the orchestrator
//! calls. The wrapper never fails. Every path yields a structurally
//! complete payload tagged with an `AiStatus`, and a detected rate limit
//! starts the shared cooldown.

pub mod gemini;
pub mod rate_limit;

pub use rate_limit::RateLimiter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{AiStatus, LocationKey, Source};

const PAUSED_REASONING: &str = "Advanced analysis paused due to rate limits.";
const SERVICE_ERROR_REASONING: &str = "Service initialization error.";
const PAUSED_SOURCE_TITLE: &str = "Environment Canada (Uplink Paused)";

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

/// The provider's JSON as parsed, before validation.
///
/// Every field is a bare JSON value: the provider is not trusted to honour
/// its own schema, so type checking happens in `engine::validate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOutlook {
    #[serde(default)]
    pub alerts: Value,
    #[serde(default)]
    pub snow_day_probability: Value,
    #[serde(default)]
    pub snow_day_reasoning: Value,
    #[serde(default)]
    pub power_outage_probability: Value,
    #[serde(default)]
    pub power_outage_reasoning: Value,
    #[serde(default)]
    pub road_conditions: Value,
    #[serde(default)]
    pub significant_weather: Value,
    #[serde(default)]
    pub period_outlooks: Value,
    #[serde(default)]
    pub minute_cast: Value,
}

impl RawOutlook {
    /// Placeholder used while the cooldown is active.
    pub fn paused() -> Self {
        Self::degraded(
            PAUSED_REASONING,
            "Analysis paused.",
            "Detailed minute-cast temporarily unavailable.",
        )
    }

    /// Placeholder used when the provider call failed for any other reason.
    pub fn service_error() -> Self {
        Self::degraded(
            SERVICE_ERROR_REASONING,
            "Could not retrieve road conditions.",
            "Forecast error.",
        )
    }

    fn degraded(reasoning: &str, road_summary: &str, minute_summary: &str) -> Self {
        RawOutlook {
            alerts: json!([]),
            snow_day_probability: json!(0),
            snow_day_reasoning: json!(reasoning),
            power_outage_probability: json!(0),
            power_outage_reasoning: json!(reasoning),
            road_conditions: json!({ "status": "Unknown", "summary": road_summary }),
            significant_weather: json!([]),
            period_outlooks: json!([]),
            minute_cast: json!({ "summary": minute_summary, "data": [] }),
        }
    }
}

/// Context passed to the provider alongside the location.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlookRequest {
    pub location: LocationKey,
    /// Rounded, °C
    pub current_temp: i32,
    pub current_condition: String,
}

/// A successful provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedResponse {
    pub outlook: RawOutlook,
    pub sources: Vec<Source>,
}

/// What the wrapper hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutcome {
    pub outlook: RawOutlook,
    pub sources: Vec<Source>,
    pub status: AiStatus,
}

impl InferenceOutcome {
    pub fn rate_limited(location: LocationKey) -> Self {
        Self {
            outlook: RawOutlook::paused(),
            sources: vec![Source {
                uri: location.alerts_url().to_string(),
                title: PAUSED_SOURCE_TITLE.to_string(),
            }],
            status: AiStatus::RateLimited,
        }
    }

    pub fn failed() -> Self {
        Self {
            outlook: RawOutlook::service_error(),
            sources: Vec::new(),
            status: AiStatus::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Inference request failed: {0}")]
    Transport(String),

    #[error("Inference request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse inference response: {0}")]
    Parse(String),

    #[error("Inference API key not configured")]
    MissingApiKey,
}

impl InferenceError {
    /// HTTP 429, or an error message mentioning quota/limit/exhaustion.
    pub fn is_rate_limit(&self) -> bool {
        let message = match self {
            InferenceError::Http { status: 429, .. } => return true,
            InferenceError::Http { body, .. } => body.to_lowercase(),
            InferenceError::Transport(msg) => msg.to_lowercase(),
            _ => return false,
        };
        ["429", "quota", "exhausted", "limit"]
            .iter()
            .any(|needle| message.contains(needle))
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Abstraction over the generative provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Run one structured, search-grounded generation for a location.
    async fn generate_outlook(
        &self,
        request: &OutlookRequest,
    ) -> Result<GroundedResponse, InferenceError>;
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

/// Calls the provider under the shared cooldown and classifies the outcome.
pub struct InferenceService {
    provider: Arc<dyn InferenceProvider>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl InferenceService {
    pub fn new(provider: Arc<dyn InferenceProvider>, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            provider,
            limiter,
            timeout,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Query the provider. Never fails: degraded payloads carry the status.
    pub async fn query(
        &self,
        location: LocationKey,
        current_temp: i32,
        current_condition: &str,
    ) -> InferenceOutcome {
        if self.limiter.is_active() {
            info!(location = %location, "Inference cooldown active, skipping provider call");
            return InferenceOutcome::rate_limited(location);
        }

        let request = OutlookRequest {
            location,
            current_temp,
            current_condition: current_condition.to_string(),
        };

        let result = match tokio::time::timeout(self.timeout, self.provider.generate_outlook(&request)).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout(self.timeout)),
        };

        match result {
            Ok(resp) => {
                info!(location = %location, sources = resp.sources.len(), "Inference outlook received");
                InferenceOutcome {
                    outlook: resp.outlook,
                    sources: resp.sources,
                    status: AiStatus::Active,
                }
            }
            Err(e) if e.is_rate_limit() => {
                self.limiter.trigger();
                warn!(location = %location, error = %e, "Inference provider rate limited");
                InferenceOutcome::rate_limited(location)
            }
            Err(e) => {
                warn!(location = %location, error = %e, "Inference provider failed");
                InferenceOutcome::failed()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
