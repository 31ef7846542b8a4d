//! Record assembly: windows the numerical series and merges them with the
//! validated outlook into a `WeatherRecord`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;

use super::validate::validate_outlook;
use crate::forecast::RawForecastSnapshot;
use crate::inference::InferenceOutcome;
use crate::types::{wmo_condition, DailyForecast, HourlyForecast, LocationKey, WeatherRecord, UNKNOWN_CONDITION};

pub const HOURLY_WINDOW: usize = 24;
pub const DAILY_WINDOW: usize = 7;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DISPLAY_FORMAT: &str = "%b %-d, %Y, %-I:%M";

/// Nearest whole degree / unit. Halves round up (-7.5 -> -7).
pub fn round(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Canadian-English medium date and short time, e.g. "Jan 15, 2026, 9:15 a.m.".
pub fn display_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    let local = at.with_timezone(&tz);
    let meridiem = if local.hour() < 12 { "a.m." } else { "p.m." };
    format!("{} {meridiem}", local.format(DISPLAY_FORMAT))
}

fn percent(value: Option<f64>) -> u8 {
    value.map(|v| v.clamp(0.0, 100.0).round() as u8).unwrap_or(0)
}

fn condition(code: Option<i32>) -> String {
    code.map(wmo_condition).unwrap_or(UNKNOWN_CONDITION).to_string()
}

fn parse_local(time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(time, LOCAL_TIME_FORMAT).ok()
}

/// Up to 24 hourly entries starting at the first one at or after the
/// snapshot's current time (index 0 if none qualifies).
pub fn hourly_window(snapshot: &RawForecastSnapshot) -> Vec<HourlyForecast> {
    let series = &snapshot.hourly;
    let start = parse_local(&snapshot.current.time)
        .and_then(|now| {
            series
                .time
                .iter()
                .position(|t| parse_local(t).is_some_and(|t| t >= now))
        })
        .unwrap_or(0);

    series
        .time
        .iter()
        .enumerate()
        .skip(start)
        .take(HOURLY_WINDOW)
        .map(|(i, t)| HourlyForecast {
            time: parse_local(t)
                .map(|t| t.format("%-I%P").to_string())
                .unwrap_or_else(|| t.clone()),
            temp: round(series.temperature_2m.get(i).copied().flatten().unwrap_or(0.0)),
            condition: condition(series.weather_code.get(i).copied().flatten()),
            precip_prob: percent(series.precipitation_probability.get(i).copied().flatten()),
        })
        .collect()
}

/// Up to 7 daily entries from today: "Today", "Tomorrow", then weekday names.
pub fn daily_window(snapshot: &RawForecastSnapshot) -> Vec<DailyForecast> {
    let series = &snapshot.daily;
    let start = parse_local(&snapshot.current.time)
        .map(|now| now.date())
        .and_then(|today| {
            series
                .time
                .iter()
                .position(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok_and(|d| d >= today))
        })
        .unwrap_or(0);

    series
        .time
        .iter()
        .enumerate()
        .skip(start)
        .take(DAILY_WINDOW)
        .enumerate()
        .map(|(n, (i, d))| DailyForecast {
            day: match n {
                0 => "Today".to_string(),
                1 => "Tomorrow".to_string(),
                _ => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map(|d| d.format("%A").to_string())
                    .unwrap_or_else(|_| d.clone()),
            },
            high: round(series.temperature_2m_max.get(i).copied().flatten().unwrap_or(0.0)),
            low: round(series.temperature_2m_min.get(i).copied().flatten().unwrap_or(0.0)),
            condition: condition(series.weather_code.get(i).copied().flatten()),
            precip_prob: percent(series.precipitation_probability_max.get(i).copied().flatten()),
        })
        .collect()
}

/// Merge a forecast snapshot and an inference outcome into a fresh record.
pub fn assemble_record(
    location: LocationKey,
    snapshot: &RawForecastSnapshot,
    outcome: InferenceOutcome,
    now: DateTime<Utc>,
    tz: Tz,
) -> WeatherRecord {
    let current = &snapshot.current;
    let current_temp = round(current.temperature_2m);
    let hourly = hourly_window(snapshot);
    let daily = daily_window(snapshot);
    let (high, low) = daily
        .first()
        .map(|d| (d.high, d.low))
        .unwrap_or((current_temp, current_temp));

    WeatherRecord {
        location,
        city_name: location.name().to_string(),
        station_name: format!("Lat {:.2}, Lon {:.2}", snapshot.latitude, snapshot.longitude),
        current_temp,
        feels_like: round(current.apparent_temperature),
        condition: wmo_condition(current.weather_code).to_string(),
        high,
        low,
        humidity: current.relative_humidity_2m,
        wind_speed: round(current.wind_speed_10m),
        outlook: validate_outlook(&outcome.outlook),
        hourly,
        daily,
        sources: outcome.sources,
        last_updated: display_timestamp(now, tz),
        is_stale: false,
        cache_timestamp: now.timestamp_millis(),
        ai_status: outcome.status,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
