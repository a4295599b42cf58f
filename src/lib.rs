//! smartcache - fingerprinted dependency caching for CI
//!
//! Keeps a build's dependency cache keyed by a digest of its manifests,
//! tracks cache effectiveness, and recommends memory/CPU budgets from
//! historical build telemetry.

pub mod cache;
pub mod cli;
pub mod config;
pub mod effectiveness;
pub mod error;
pub mod metrics;
pub mod resources;
pub mod ui;

pub use error::{SmartCacheError, SmartCacheResult};
