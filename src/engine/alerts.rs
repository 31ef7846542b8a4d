//! New-alert detection for live monitoring.
//!
//! An alert is identified by location, title and the record's
//! `last_updated` stamp, so a re-issued alert on a later refresh is reported
//! again while the same record served twice (from cache) is not. Only the
//! identities from each location's latest record are kept.

use std::collections::{HashMap, HashSet};

use crate::types::{LocationKey, WeatherAlert, WeatherRecord};

#[derive(Debug, Default)]
pub struct AlertWatcher {
    seen: HashMap<LocationKey, HashSet<String>>,
}

impl AlertWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert_id(location: LocationKey, alert: &WeatherAlert, last_updated: &str) -> String {
        format!("{location}-{}-{last_updated}", alert.title)
    }

    /// Alerts in `record` not present in the previous record observed for
    /// the same location. The record's alerts replace that location's set.
    pub fn observe<'a>(&mut self, record: &'a WeatherRecord) -> Vec<&'a WeatherAlert> {
        let previous = self.seen.remove(&record.location).unwrap_or_default();
        let mut current = HashSet::with_capacity(record.outlook.alerts.len());

        let fresh = record
            .outlook
            .alerts
            .iter()
            .filter(|alert| {
                let id = Self::alert_id(record.location, alert, &record.last_updated);
                let new = !previous.contains(&id);
                current.insert(id) && new
            })
            .collect();

        self.seen.insert(record.location, current);
        fresh
    }

    pub fn seen_count(&self) -> usize {
        self.seen.values().map(HashSet::len).sum()
    }
}
