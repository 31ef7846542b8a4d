//! SQUALL: New Brunswick weather dashboard backend
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the providers, cache and orchestrator, serves the dashboard API
//! and runs the live-monitoring loop with graceful shutdown.

use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use squall::cache::{Cache, FileCache, MemoryCache};
use squall::config::AppConfig;
use squall::dashboard::routes::AlertLogEntry;
use squall::dashboard::{self, DashboardState};
use squall::engine::merge::display_timestamp;
use squall::engine::{AlertWatcher, OrchestratorSettings, WeatherOrchestrator};
use squall::forecast::open_meteo::OpenMeteoClient;
use squall::inference::gemini::GeminiClient;
use squall::inference::{InferenceService, RateLimiter};

const BANNER: &str = r#"
  ____   ___  _   _   _    _     _
 / ___| / _ \| | | | / \  | |   | |
 \___ \| | | | | | |/ _ \ | |   | |
  ___) | |_| | |_| / ___ \| |___| |___
 |____/ \__\_\\___/_/   \_\_____|_____|

  New Brunswick weather dashboard
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cfg = AppConfig::load_or_default("config.toml")?;
    let timezone = cfg.timezone()?;

    println!("{BANNER}");
    info!(
        name = %cfg.app.name,
        timezone = %timezone,
        model = %cfg.inference.model,
        cache_dir = %cfg.cache.dir,
        "SQUALL starting up"
    );

    // -- Initialise components -------------------------------------------

    let forecast = OpenMeteoClient::from_config(&cfg.forecast, &cfg.app.timezone)?;

    let gemini = GeminiClient::from_config(&cfg.inference)?;
    if !gemini.has_api_key() {
        warn!(
            env = %cfg.inference.api_key_env,
            "No Gemini API key configured, AI analysis will report failed"
        );
    }

    let limiter = Arc::new(RateLimiter::new(chrono::Duration::seconds(
        cfg.inference.cooldown_secs as i64,
    )));
    let inference = InferenceService::new(
        Arc::new(gemini),
        limiter,
        Duration::from_secs(cfg.inference.timeout_secs),
    );

    let cache: Arc<dyn Cache> = if cfg.cache.dir.is_empty() {
        info!("No cache directory configured, using in-memory cache");
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(FileCache::new(&cfg.cache.dir))
    };

    let orchestrator = WeatherOrchestrator::new(
        Arc::new(forecast),
        inference,
        cache,
        OrchestratorSettings::from_config(&cfg)?,
    );
    let state = Arc::new(DashboardState::new(orchestrator.clone()));

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(state.clone(), cfg.dashboard.port).await?;
    }

    // -- Main loop -------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if !cfg.monitor.enabled {
        info!("Live monitoring disabled. Press Ctrl+C to stop.");
        shutdown.await?;
        info!("SQUALL shut down cleanly.");
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.monitor.interval_secs));
    let mut watcher = AlertWatcher::new();

    info!(
        interval_secs = cfg.monitor.interval_secs,
        locations = ?orchestrator.locations(),
        "Entering monitor loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_cycle(&orchestrator, &state, &mut watcher, timezone).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let stats = orchestrator.stats();
    info!(
        cache_hits = stats.cache_hits,
        fetches = stats.fetches,
        stale_served = stats.stale_served,
        failures = stats.failures,
        "SQUALL shut down cleanly."
    );

    Ok(())
}

/// Force-refresh every monitored location and report new alerts.
async fn run_cycle(
    orchestrator: &WeatherOrchestrator,
    state: &DashboardState,
    watcher: &mut AlertWatcher,
    timezone: Tz,
) {
    state.begin_check().await;

    let results = orchestrator.get_all(true).await;
    let mut new_alerts = Vec::new();
    let mut failed = 0;
    let mut stale = 0;

    for (location, result) in &results {
        match result {
            Ok(record) => {
                if record.is_stale {
                    stale += 1;
                }
                info!(location = %location, "{record}");
                for alert in watcher.observe(record) {
                    warn!(
                        location = %location,
                        severity = %alert.severity,
                        title = %alert.title,
                        "New weather alert"
                    );
                    new_alerts.push(AlertLogEntry::new(record, alert));
                }
            }
            Err(e) => {
                failed += 1;
                error!(location = %location, error = %e, "Refresh failed");
            }
        }
    }

    let checked_at = display_timestamp(Utc::now(), timezone);
    let alerts = new_alerts.len();
    state.finish_check(failed == 0, checked_at, new_alerts).await;

    info!(
        locations = results.len(),
        failed,
        stale,
        new_alerts = alerts,
        rate_limited = orchestrator.is_rate_limited(),
        "Monitor cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("squall=info"));

    let json_logging = std::env::var("SQUALL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
