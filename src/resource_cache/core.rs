use crate::error::Result;
use crate::types::{
    AnimationEntry, CacheEntry, CacheSnapshot, CacheStatistics, CacheStatus, FontEntry,
    ResourceKind, ScanReport,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};
use tracing::{error, info};

use super::scanner::scan_into;

/// Called inside the exclusive section right before a scan walks its folder.
pub type ScanHook = Arc<dyn Fn(ResourceKind) + Send + Sync>;

pub type FontCache = ScannedCache<FontEntry>;
pub type AnimationCache = ScannedCache<AnimationEntry>;

/// Everything guarded by a cache's lock.
#[derive(Debug)]
pub struct CacheState<E> {
    pub(crate) entries: Vec<E>,
    /// Logical buffer size, grown and shrunk by the scanner.
    pub(crate) capacity: usize,
    pub(crate) scan_time: Option<SystemTime>,
    pub(crate) valid: bool,
}

impl<E> Default for CacheState<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            capacity: 0,
            scan_time: None,
            valid: false,
        }
    }
}

impl<E> CacheState<E> {
    fn status_at(&self, now: SystemTime, expiry: Duration) -> CacheStatus {
        if !self.valid {
            return CacheStatus::Invalid;
        }
        if self.entries.is_empty() {
            return CacheStatus::Empty;
        }

        let expired = self
            .scan_time
            .and_then(|scanned| now.duration_since(scanned).ok())
            .is_some_and(|age| age > expiry);

        if expired {
            CacheStatus::Expired
        } else {
            CacheStatus::Ok
        }
    }
}

/// Metadata index of one resource folder, shared between UI threads and
/// scan threads behind a single reader/writer lock.
pub struct ScannedCache<E: CacheEntry> {
    root: PathBuf,
    expiry: Duration,
    scan_hook: Option<ScanHook>,
    state: RwLock<CacheState<E>>,
}

impl<E: CacheEntry> std::fmt::Debug for ScannedCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannedCache")
            .field("kind", &E::KIND)
            .field("root", &self.root)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl<E: CacheEntry> ScannedCache<E> {
    pub fn new(root: PathBuf, expiry: Duration) -> Self {
        info!("{} cache initialized for {}", E::KIND, root.display());
        Self {
            root,
            expiry,
            scan_hook: None,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn with_scan_hook(mut self, hook: Option<ScanHook>) -> Self {
        self.scan_hook = hook;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rebuild the cache from disk. The whole walk runs under the exclusive
    /// lock, so readers see either the previous or the new contents.
    pub fn scan(&self, current: Option<&str>) -> Result<ScanReport> {
        let mut state = self.write();
        if let Some(hook) = &self.scan_hook {
            hook(E::KIND);
        }
        scan_into(&mut state, &self.root, current)
    }

    pub fn get_entries(&self) -> CacheSnapshot<E> {
        self.get_entries_at(SystemTime::now())
    }

    /// Like [`ScannedCache::get_entries`], judging expiry against `now`.
    pub fn get_entries_at(&self, now: SystemTime) -> CacheSnapshot<E> {
        let state = self.read();
        let status = state.status_at(now, self.expiry);

        if !status.has_data() {
            return CacheSnapshot::empty(status);
        }

        let mut entries = Vec::new();
        if entries.try_reserve_exact(state.entries.len()).is_err() {
            error!(
                "Failed to copy {} {} cache entries",
                state.entries.len(),
                E::KIND
            );
            return CacheSnapshot::empty(CacheStatus::Error);
        }
        entries.extend_from_slice(&state.entries);

        CacheSnapshot { status, entries }
    }

    pub fn status(&self) -> CacheStatus {
        self.read().status_at(SystemTime::now(), self.expiry)
    }

    /// Mark the contents stale without releasing them; the next scan
    /// repopulates the same buffer.
    pub fn invalidate(&self) {
        self.write().valid = false;
        info!("{} cache invalidated", E::KIND);
    }

    /// Move the current marker to the entry `identifier` selects. An unknown
    /// identifier leaves every entry unmarked.
    pub fn update_current(&self, identifier: &str) {
        let mut state = self.write();
        let mut found = false;
        for entry in state.entries.iter_mut() {
            let is_match = !found && entry.matches(identifier);
            found |= is_match;
            entry.set_current(is_match);
        }
    }

    pub fn current_entry(&self) -> Option<E> {
        self.read().entries.iter().find(|e| e.is_current()).cloned()
    }

    pub fn statistics(&self) -> CacheStatistics {
        let state = self.read();
        CacheStatistics {
            count: state.entries.len(),
            capacity: state.capacity,
            last_scan_time: state.scan_time.map(Into::into),
            valid: state.valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.read().valid
    }

    /// Free the entry buffer and return to the never-scanned state.
    pub fn release(&self) {
        let mut state = self.write();
        *state = CacheState::default();
        info!("{} cache released", E::KIND);
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<E>> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("{} cache lock poisoned, recovering", E::KIND);
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<E>> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("{} cache lock poisoned, recovering", E::KIND);
                poisoned.into_inner()
            }
        }
    }
}
