//! Google Gemini integration.
//!
//! Implements `InferenceProvider` with the `generateContent` REST endpoint,
//! the Google Search grounding tool and a JSON response schema. Handles
//! prompt construction, response-text extraction and grounding sources.
//! Classification of failures (rate limit vs. other) is left to the
//! wrapper in `inference::InferenceService`.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{GroundedResponse, InferenceError, InferenceProvider, OutlookRequest, RawOutlook};
use crate::config::{AppConfig, InferenceConfig};
use crate::types::Source;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_SOURCE_TITLE: &str = "Search Source";

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    tools: Vec<Value>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    total_calls: AtomicU64,
}

impl GeminiClient {
    /// Create a client. A missing key is not an error here: every call
    /// then fails with `MissingApiKey` and the dashboard degrades.
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        model: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build Gemini HTTP client: {e}"))?;

        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.is_empty()).map(SecretString::new),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            total_calls: AtomicU64::new(0),
        })
    }

    /// Build from config, resolving the key from the configured env var.
    pub fn from_config(cfg: &InferenceConfig) -> anyhow::Result<Self> {
        let api_key = AppConfig::resolve_env(&cfg.api_key_env).ok();
        Self::new(
            api_key,
            Some(cfg.base_url.clone()),
            Some(cfg.model.clone()),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model)
        )
    }

    /// Build the user prompt for one location.
    pub fn build_prompt(request: &OutlookRequest) -> String {
        let city = request.location.name();
        format!(
            "Analyze the real-time and forecast weather for {city}, New Brunswick. \
             Use provided conditions and perform a fresh web search for active info.\n\
             Current local conditions: {temp}°C, {condition}.\n\n\
             Based on all available info, determine:\n\
             1. Active Weather Alerts: Search specifically for official Environment Canada weather alerts for {city}.\n\
             2. Snow Day Probability: Next school day cancellation probability (0-100) for NB with reasoning.\n\
             3. Power Outage Risk: Probability (0-100) based on local conditions, with reasoning.\n\
             4. Road Conditions: Status from NB 511.\n\
             5. 7-Day Significant Weather Outlook: Key events for each of the next 7 days.\n\
             6. Period Outlooks: Morning, Afternoon, Overnight.\n\
             7. Minute-by-Minute Forecast: 60-minute precipitation prediction, one entry per minute.\n\n\
             Return strictly JSON.",
            temp = request.current_temp,
            condition = request.current_condition,
        )
    }

    /// JSON schema for the structured response.
    pub fn response_schema() -> Value {
        let string = json!({ "type": "STRING" });
        let number = json!({ "type": "NUMBER" });
        let enumeration = |values: &[&str]| json!({ "type": "STRING", "enum": values });

        json!({
            "type": "OBJECT",
            "properties": {
                "alerts": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "severity": enumeration(&["Minor", "Moderate", "Severe", "Extreme"]),
                            "title": string,
                            "description": string,
                        },
                        "required": ["severity", "title", "description"],
                    },
                },
                "snowDayProbability": number,
                "snowDayReasoning": string,
                "powerOutageProbability": number,
                "powerOutageReasoning": string,
                "roadConditions": {
                    "type": "OBJECT",
                    "properties": {
                        "status": enumeration(&["Good", "Fair", "Poor", "Unknown"]),
                        "summary": string,
                    },
                    "required": ["status", "summary"],
                },
                "significantWeather": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "day": string,
                            "severity": enumeration(&["High", "Moderate", "None"]),
                            "description": string,
                        },
                        "required": ["day", "severity", "description"],
                    },
                },
                "periodOutlooks": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "period": enumeration(&["Morning", "Afternoon", "Overnight"]),
                            "day": string,
                            "temp": string,
                            "condition": string,
                            "summary": string,
                        },
                        "required": ["period", "day", "temp", "condition", "summary"],
                    },
                },
                "minuteCast": {
                    "type": "OBJECT",
                    "properties": {
                        "summary": string,
                        "data": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "time": string,
                                    "intensity": number,
                                    "type": enumeration(&["rain", "snow", "ice", "mix", "none"]),
                                },
                                "required": ["time", "intensity", "type"],
                            },
                        },
                    },
                    "required": ["summary", "data"],
                },
            },
            "required": [
                "alerts", "snowDayProbability", "snowDayReasoning",
                "powerOutageProbability", "powerOutageReasoning", "roadConditions",
                "significantWeather", "periodOutlooks", "minuteCast",
            ],
        })
    }

    fn build_request(request: &OutlookRequest) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(Self::build_prompt(request)),
                }],
            }],
            tools: vec![json!({ "googleSearch": {} })],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Self::response_schema(),
            },
        }
    }

    /// Extract the outlook and grounding sources from the first candidate.
    fn parse_response(body: GenerateResponse) -> Result<GroundedResponse, InferenceError> {
        let candidate = body.candidates.into_iter().next();

        let text = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let outlook = Self::parse_outlook_text(&text)?;

        let sources = candidate
            .and_then(|c| c.grounding_metadata)
            .map(|meta| {
                meta.grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| {
                        let uri = web.uri.filter(|u| !u.is_empty())?;
                        Some(Source {
                            uri,
                            title: web
                                .title
                                .filter(|t| !t.is_empty())
                                .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(GroundedResponse { outlook, sources })
    }

    /// Parse the model text as a JSON object. Empty text counts as `{}`;
    /// a surrounding Markdown code fence is tolerated.
    pub fn parse_outlook_text(text: &str) -> Result<RawOutlook, InferenceError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(RawOutlook::default());
        }
        let unfenced = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(trimmed)
            .trim();

        serde_json::from_str::<RawOutlook>(unfenced).map_err(|e| InferenceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl InferenceProvider for GeminiClient {
    async fn generate_outlook(
        &self,
        request: &OutlookRequest,
    ) -> Result<GroundedResponse, InferenceError> {
        let api_key = self.api_key.as_ref().ok_or(InferenceError::MissingApiKey)?;

        debug!(location = %request.location, model = %self.model, "Calling Gemini");

        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        Self::parse_response(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
