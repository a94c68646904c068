use std::path::PathBuf;
use std::time::Duration;

use crate::types::ResourceKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Resource folder not found: {0}")]
    NotFound(PathBuf),

    #[error("Path exceeds {max} characters ({len}): {path}")]
    PathTooLong { path: PathBuf, len: usize, max: usize },

    #[error("{kind} cache capacity limit reached ({max} entries)")]
    CapacityExceeded { kind: ResourceKind, max: usize },

    #[error("Failed to allocate {requested} {kind} cache entries")]
    AllocationFailure { kind: ResourceKind, requested: usize },

    #[error("Thread '{name}' did not exit within {timeout:?}")]
    ThreadJoinTimeout { name: String, timeout: Duration },

    #[error("Failed to spawn thread '{name}': {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file path: {0}")]
    InvalidConfigPath(PathBuf),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("None of the resource folders could be watched")]
    NoWatchableDirectory,
}

pub type Result<T> = std::result::Result<T, Error>;
