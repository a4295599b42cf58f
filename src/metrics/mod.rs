//! Build telemetry: cache hit/miss events and build resource samples

mod jsonl;
pub mod model;
mod psql;
mod store;

pub use jsonl::JsonlStore;
pub use model::{BuildMetricSample, BuildResult, CacheEvent, CacheOutcome, SampleQuery};
pub use psql::PsqlStore;
pub use store::{open_store, MetricsStore};
