//! Process-wide cooldown for the inference provider.
//!
//! Constructed once and shared (`Arc<RateLimiter>`) between the inference
//! wrapper, which triggers it, and the orchestrator, which only reads it.
//! The reset time is never cleared; it simply elapses.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use tracing::warn;

pub const DEFAULT_COOLDOWN_SECS: i64 = 60;

#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    reset_at: Mutex<Option<DateTime<Utc>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            reset_at: Mutex::new(None),
        }
    }

    /// Whether the cooldown window is still open.
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.resets_at(), Some(reset) if now < reset)
    }

    /// Start (or restart) the cooldown from now. Returns the new reset time.
    pub fn trigger(&self) -> DateTime<Utc> {
        self.trigger_at(Utc::now())
    }

    pub fn trigger_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let reset = now + self.cooldown;
        let mut guard = self.reset_at.lock().unwrap_or_else(|e| e.into_inner());
        // Never move the reset time backwards.
        let reset = match *guard {
            Some(existing) if existing > reset => existing,
            _ => reset,
        };
        *guard = Some(reset);
        warn!(resets_at = %reset, "Inference rate limit detected, cooling down");
        reset
    }

    /// Last reset time, if a rate limit was ever detected.
    pub fn resets_at(&self) -> Option<DateTime<Utc>> {
        *self.reset_at.lock().unwrap_or_else(|e| e.into_inner())
    }
}
