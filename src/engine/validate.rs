//! Shape validation for the AI-derived outlook.
//!
//! The provider's JSON is trusted for content, never for shape. Every field
//! is coerced into the declared type: probabilities clamp to [0, 100],
//! enums fall back to their safe default, lists are capped, and anything
//! missing or of the wrong type becomes an empty value.

use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::debug;

use crate::inference::RawOutlook;
use crate::types::{
    AlertSeverity, EventSeverity, InferredOutlook, MinuteCast, MinuteCastEntry, Period,
    PeriodOutlook, PrecipType, RoadConditions, RoadStatus, SignificantWeatherEvent, WeatherAlert,
};

pub const MAX_SIGNIFICANT_WEATHER: usize = 7;
pub const MAX_PERIOD_OUTLOOKS: usize = 3;
pub const MAX_MINUTE_CAST: usize = 60;

/// Coerce a raw provider payload into a well-formed outlook.
pub fn validate_outlook(raw: &RawOutlook) -> InferredOutlook {
    let outlook = InferredOutlook {
        alerts: objects(&raw.alerts)
            .map(|o| WeatherAlert {
                severity: enum_field(o, "severity"),
                title: text_field(o, "title"),
                description: text_field(o, "description"),
            })
            .collect(),
        snow_day_probability: probability(&raw.snow_day_probability),
        snow_day_reasoning: text(&raw.snow_day_reasoning),
        power_outage_probability: probability(&raw.power_outage_probability),
        power_outage_reasoning: text(&raw.power_outage_reasoning),
        road_conditions: road_conditions(&raw.road_conditions),
        significant_weather: objects(&raw.significant_weather)
            .take(MAX_SIGNIFICANT_WEATHER)
            .map(|o| SignificantWeatherEvent {
                day: text_field(o, "day"),
                severity: enum_field::<EventSeverity>(o, "severity"),
                description: text_field(o, "description"),
            })
            .collect(),
        period_outlooks: objects(&raw.period_outlooks)
            .take(MAX_PERIOD_OUTLOOKS)
            .enumerate()
            .map(|(i, o)| PeriodOutlook {
                period: o
                    .get("period")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(Period::ALL[i]),
                day: text_field(o, "day"),
                temp: text_field(o, "temp"),
                condition: text_field(o, "condition"),
                summary: text_field(o, "summary"),
            })
            .collect(),
        minute_cast: minute_cast(&raw.minute_cast),
    };

    debug!(
        alerts = outlook.alerts.len(),
        snow_day = outlook.snow_day_probability,
        power_outage = outlook.power_outage_probability,
        "Outlook validated"
    );
    outlook
}

fn road_conditions(value: &Value) -> RoadConditions {
    match value.as_object() {
        Some(o) => RoadConditions {
            status: enum_field(o, "status"),
            summary: text_field(o, "summary"),
        },
        None => RoadConditions {
            status: RoadStatus::Unknown,
            summary: String::new(),
        },
    }
}

fn minute_cast(value: &Value) -> MinuteCast {
    let Some(o) = value.as_object() else {
        return MinuteCast {
            summary: String::new(),
            data: Vec::new(),
        };
    };
    MinuteCast {
        summary: text_field(o, "summary"),
        data: o
            .get("data")
            .into_iter()
            .flat_map(|d| objects(d))
            .take(MAX_MINUTE_CAST)
            .map(|e| MinuteCastEntry {
                time: text_field(e, "time"),
                intensity: e
                    .get("intensity")
                    .and_then(number)
                    .map(|v| v.clamp(0.0, 1.0))
                    .unwrap_or(0.0),
                precip_type: enum_field::<PrecipType>(e, "type"),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Value coercion helpers
// ---------------------------------------------------------------------------

/// Object entries of an array. Non-arrays yield nothing, non-object entries are skipped.
fn objects(value: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .as_array()
        .map(|a| a.as_slice())
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_object)
}

/// Numbers and numeric strings ("45", "45%"). NaN is treated as absent.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (!n.is_nan()).then_some(n)
}

fn probability(value: &Value) -> f64 {
    number(value).map(|v| v.clamp(0.0, 100.0)).unwrap_or(0.0)
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn text_field(o: &Map<String, Value>, key: &str) -> String {
    o.get(key).map(text).unwrap_or_default()
}

fn enum_field<T: FromStr + Default>(o: &Map<String, Value>, key: &str) -> T {
    o.get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
