//! End-to-end orchestrator behaviour over fake providers.

use chrono::Duration;
use serde_json::json;
use std::sync::Arc;

use squall::cache::{Cache, FileCache};
use squall::engine::{AlertWatcher, OrchestratorSettings};
use squall::inference::RawOutlook;
use squall::types::*;

use crate::mock_providers::*;

fn outlook(value: serde_json::Value) -> RawOutlook {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_repeat_calls_within_ttl_are_idempotent() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Respond(good_outlook())));

    let first = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    let second = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    let third = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(h.forecast.calls(), 1);
    assert_eq!(h.inference.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_forced_refreshes_share_one_fetch() {
    let h = Harness::new(
        FakeForecast::with_delay(std::time::Duration::from_millis(200)),
        FakeInference::with_delay(
            Behaviour::Respond(good_outlook()),
            std::time::Duration::from_millis(500),
        ),
    );

    let (a, b, c) = tokio::join!(
        h.orchestrator.get_weather(LocationKey::Moncton, true),
        h.orchestrator.get_weather(LocationKey::Moncton, true),
        h.orchestrator.get_weather(LocationKey::Moncton, true),
    );

    assert_eq!(h.forecast.calls(), 1);
    assert_eq!(h.inference.calls(), 1);
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fetches_for_different_locations_do_not_merge() {
    let h = Harness::new(
        FakeForecast::with_delay(std::time::Duration::from_millis(200)),
        FakeInference::new(Behaviour::Respond(good_outlook())),
    );

    let (a, b) = tokio::join!(
        h.orchestrator.get_weather(LocationKey::Moncton, true),
        h.orchestrator.get_weather(LocationKey::Fredericton, true),
    );

    assert_eq!(h.forecast.calls(), 2);
    assert_eq!(a.unwrap().city_name, "Moncton");
    assert_eq!(b.unwrap().city_name, "Fredericton");
}

#[tokio::test]
async fn test_probabilities_are_clamped() {
    let h = Harness::new(
        FakeForecast::new(),
        FakeInference::new(Behaviour::Respond(outlook(json!({
            "snowDayProbability": -10,
            "powerOutageProbability": 150
        })))),
    );

    let record = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    assert_eq!(record.outlook.snow_day_probability, 0.0);
    assert_eq!(record.outlook.power_outage_probability, 100.0);
}

#[tokio::test]
async fn test_invalid_road_status_coerced_to_unknown() {
    let h = Harness::new(
        FakeForecast::new(),
        FakeInference::new(Behaviour::Respond(outlook(json!({
            "roadConditions": { "status": "Catastrophic", "summary": "Closed." }
        })))),
    );

    let record = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    assert_eq!(record.outlook.road_conditions.status, RoadStatus::Unknown);
    assert_eq!(record.outlook.road_conditions.summary, "Closed.");
}

#[tokio::test]
async fn test_hourly_window_starts_at_current_hour() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Respond(good_outlook())));

    let record = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    // Precipitation probability in the fake series equals the entry index.
    let indices: Vec<u8> = record.hourly.iter().map(|e| e.precip_prob).collect();
    assert_eq!(indices, (10..34).collect::<Vec<u8>>());
    assert_eq!(record.hourly[0].time, "10am");

    assert_eq!(record.daily.len(), 7);
    assert_eq!(record.daily[0].day, "Today");
    assert_eq!(record.daily[1].day, "Tomorrow");
    assert_eq!((record.high, record.low), (-4, -16));
}

#[tokio::test]
async fn test_inference_receives_rounded_context() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Respond(good_outlook())));

    let record = h.orchestrator.get_weather(LocationKey::McGivney, false).await.unwrap();
    let requests = h.inference.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].location, LocationKey::McGivney);
    assert_eq!(requests[0].current_temp, -7);
    assert_eq!(requests[0].current_condition, "Heavy snow fall");
    assert_eq!(record.current_temp, -7);
    assert_eq!(record.feels_like, -15);
    assert_eq!(record.wind_speed, 32);
}

#[tokio::test]
async fn test_rate_limit_cooldown_skips_provider() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::RateLimited));

    let first = h.orchestrator.get_weather(LocationKey::Fredericton, true).await.unwrap();
    assert_eq!(first.ai_status, AiStatus::RateLimited);
    assert_eq!(h.inference.calls(), 1);
    assert!(h.orchestrator.is_rate_limited());

    // Even a healthy provider is not called during the cooldown.
    h.inference.set_behaviour(Behaviour::Respond(good_outlook()));

    // No cache for Moncton: numerical fetch proceeds, inference is skipped.
    let moncton = h.orchestrator.get_weather(LocationKey::Moncton, true).await.unwrap();
    assert_eq!(moncton.ai_status, AiStatus::RateLimited);
    assert_eq!(moncton.sources.len(), 1);
    assert_eq!(moncton.sources[0].uri, LocationKey::Moncton.alerts_url());
    assert_eq!(moncton.outlook.snow_day_reasoning, "Advanced analysis paused due to rate limits.");

    // Cached Fredericton: served stale without any provider call.
    let again = h.orchestrator.get_weather(LocationKey::Fredericton, true).await.unwrap();
    assert!(again.is_stale);
    assert_eq!(again.ai_status, AiStatus::RateLimited);
    assert_eq!(again.cache_timestamp, first.cache_timestamp);

    assert_eq!(h.inference.calls(), 1);
    assert_eq!(h.forecast.calls(), 2);
}

#[tokio::test]
async fn test_cooldown_expiry_resumes_inference() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Respond(good_outlook())));
    // A cooldown that started two minutes ago has elapsed.
    h.limiter.trigger_at(chrono::Utc::now() - Duration::minutes(2));
    assert!(!h.orchestrator.is_rate_limited());

    let record = h.orchestrator.get_weather(LocationKey::Moncton, true).await.unwrap();
    assert_eq!(record.ai_status, AiStatus::Active);
    assert_eq!(h.inference.calls(), 1);
}

#[tokio::test]
async fn test_total_failure_without_cache_is_error() {
    let forecast = FakeForecast::new();
    forecast.set_error("Open-Meteo API error: 503 Service Unavailable");
    let h = Harness::new(forecast, FakeInference::new(Behaviour::Fail));

    let err = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap_err();
    assert!(matches!(err, WeatherError::NoData { location: LocationKey::Moncton, .. }));
    assert!(err.to_string().contains("Moncton"));
    // The numerical call gates the inference call.
    assert_eq!(h.inference.calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_serves_stale_cache_with_original_timestamp() {
    let forecast = FakeForecast::new();
    forecast.set_error("connection refused");
    let h = Harness::new(forecast, FakeInference::new(Behaviour::Respond(good_outlook())));
    let ts = h.seed(LocationKey::Moncton, Duration::minutes(20));

    let record = h.orchestrator.get_weather(LocationKey::Moncton, true).await.unwrap();
    assert!(record.is_stale);
    assert_eq!(record.cache_timestamp, ts);
    assert_eq!(record.outlook.snow_day_probability, 42.0);

    // Expired 5 minutes ago, so a retry is due now.
    let countdown = h.orchestrator.refresh_countdown(&record, chrono::Utc::now());
    assert_eq!(countdown, Some(Duration::zero()));
}

#[tokio::test]
async fn test_inference_failure_is_not_stale() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Fail));

    let record = h.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    assert!(!record.is_stale);
    assert_eq!(record.ai_status, AiStatus::Failed);
    assert!(record.sources.is_empty());
    assert_eq!(record.outlook.road_conditions.summary, "Could not retrieve road conditions.");
    assert!(!h.orchestrator.is_rate_limited());
}

#[tokio::test]
async fn test_file_cache_survives_restart() {
    let dir = std::env::temp_dir().join(format!("squall_it_cache_{}", uuid::Uuid::new_v4()));

    let first = Harness::with_cache(
        FakeForecast::new(),
        FakeInference::new(Behaviour::Respond(good_outlook())),
        Arc::new(FileCache::new(&dir)),
        OrchestratorSettings::default(),
    );
    let written = first.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();

    let restarted = Harness::with_cache(
        FakeForecast::new(),
        FakeInference::new(Behaviour::Fail),
        Arc::new(FileCache::new(&dir)),
        OrchestratorSettings::default(),
    );
    let read = restarted.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();

    assert_eq!(read, written);
    assert_eq!(restarted.forecast.calls(), 0);
    assert_eq!(restarted.inference.calls(), 0);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_schema_version_bump_ignores_old_entries() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Respond(good_outlook())));
    h.seed(LocationKey::Moncton, Duration::minutes(1));

    let bumped = Harness::with_cache(
        FakeForecast::new(),
        FakeInference::new(Behaviour::Respond(good_outlook())),
        h.cache.clone(),
        OrchestratorSettings {
            schema_version: "v14".to_string(),
            ..OrchestratorSettings::default()
        },
    );
    let record = bumped.orchestrator.get_weather(LocationKey::Moncton, false).await.unwrap();
    assert_eq!(bumped.forecast.calls(), 1);
    assert_eq!(record.outlook.snow_day_probability, 85.0);
}

#[tokio::test]
async fn test_monitor_cycle_reports_new_alerts_once() {
    let h = Harness::new(FakeForecast::new(), FakeInference::new(Behaviour::Respond(good_outlook())));
    let mut watcher = AlertWatcher::new();

    let results = h.orchestrator.get_all(true).await;
    let reported: usize = results
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .map(|record| watcher.observe(record).len())
        .sum();
    assert_eq!(reported, 3);

    // Within the TTL the same records come back, so nothing new is reported.
    let results = h.orchestrator.get_all(false).await;
    let reported: usize = results
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .map(|record| watcher.observe(record).len())
        .sum();
    assert_eq!(reported, 0);
    assert_eq!(h.forecast.calls(), 3);
}

#[tokio::test]
async fn test_cache_written_only_after_successful_fetch() {
    let forecast = FakeForecast::new();
    forecast.set_error("timeout");
    let h = Harness::new(forecast, FakeInference::new(Behaviour::Respond(good_outlook())));

    let _ = h.orchestrator.get_weather(LocationKey::Moncton, false).await;
    assert!(h
        .cache
        .get(&squall::cache::cache_key("v13_search", LocationKey::Moncton))
        .is_none());
}
