//! Core engine: cache → single-flight fetch → validate → merge → persist.

pub mod alerts;
pub mod merge;
pub mod orchestrator;
pub mod single_flight;
pub mod validate;

pub use alerts::AlertWatcher;
pub use orchestrator::{OrchestratorSettings, OrchestratorStats, WeatherOrchestrator};
pub use single_flight::SingleFlight;
