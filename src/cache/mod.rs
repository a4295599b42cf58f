//! Fingerprinted dependency cache
//!
//! Provides a single dependency cache directory whose validity is derived
//! from a SHA256 fingerprint of the project's dependency manifests.
//!
//! # Cache States
//!
//! | State | Meaning | `warm` | `invalidate` | `invalidate --force` |
//! |-------|---------|--------|--------------|----------------------|
//! | ABSENT | no entry directory | populate | no-op | no-op |
//! | PRESENT | recorded fingerprint matches | no-op | refuse | evict |
//! | STALE | fingerprint differs or metadata missing | repopulate | evict | evict |
//!
//! There is no dirty flag: staleness follows from fingerprint comparison
//! alone, and a directory without metadata is never treated as fresh.

pub mod entry;
pub mod fingerprint;
mod lock;
pub mod populate;
pub mod store;

pub use entry::{format_bytes, CacheEntry, CacheState, CacheStatus, StaleReason};
pub use fingerprint::{compute_fingerprint, resolve_manifests, Fingerprint, ManifestPreset};
pub use populate::{CommandPopulator, Populator};
pub use store::{CacheStore, InvalidateOutcome, WarmOutcome};
