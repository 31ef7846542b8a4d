//! SQUALL: New Brunswick weather dashboard backend
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod forecast;
pub mod inference;
pub mod cache;
pub mod engine;
pub mod dashboard;
