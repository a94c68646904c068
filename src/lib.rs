//! Metadata cache for the font and animation resource folders.
//!
//! A [`CacheManager`] scans both folders on a background thread, serves
//! owned snapshots to UI threads, and rescans when a [`DirectoryWatcher`]
//! reports a relevant change. Only names, paths and flags are cached, never
//! file contents.

pub mod cache_manager;
pub mod config;
pub mod error;
pub mod logging;
pub mod path_utils;
pub mod resource_cache;
pub mod types;
pub mod worker;

pub use cache_manager::{CacheManager, RefreshState, ShutdownOutcome};
pub use config::{CacheConfig, SelectionSource, StaticSelection};
pub use error::{Error, Result};
pub use resource_cache::{
    AnimationCache, DirectoryWatcher, FontCache, RefreshTrigger, ScanHook, ScannedCache,
};
pub use types::{
    AnimationEntry, CacheEntry, CacheSnapshot, CacheStatistics, CacheStatus, FontEntry,
    ResourceKind, ResourceStatistics, ScanReport, MAX_ENTRIES,
};
