use crate::error::{Error, Result};
use crate::path_utils::{ensure_path_len, has_extension, relative_key};
use crate::types::{
    CacheEntry, ResourceKind, ScanReport, ScannedFile, INITIAL_CAPACITY, MAX_ENTRIES,
    MAX_SCAN_DEPTH,
};
use ignore::WalkBuilder;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, info, warn};

use super::core::CacheState;

/// Files found under a root, plus counts of the ones that had to be dropped.
#[derive(Debug, Default)]
pub struct WalkResult {
    pub files: Vec<ScannedFile>,
    pub skipped_too_long: usize,
    pub skipped_over_capacity: usize,
}

/// Rebuild `state` from the folder tree at `root`.
///
/// Holding `&mut CacheState` means the caller owns the cache's exclusive
/// lock for the whole walk. On error the previous contents are untouched.
pub fn scan_into<E: CacheEntry>(
    state: &mut CacheState<E>,
    root: &Path,
    current: Option<&str>,
) -> Result<ScanReport> {
    let scan_start = std::time::Instant::now();
    ensure_path_len(root)?;

    if !root.is_dir() {
        warn!("SCAN_MISSING: {} folder does not exist: {}", E::KIND, root.display());
        return Err(Error::NotFound(root.to_path_buf()));
    }

    let virtual_entries = E::virtual_entries();
    let file_limit = MAX_ENTRIES.saturating_sub(virtual_entries.len());
    let walk = walk_resource_folder(root, E::KIND, file_limit)?;

    if walk.skipped_over_capacity > 0 {
        let overflow = Error::CapacityExceeded {
            kind: E::KIND,
            max: MAX_ENTRIES,
        };
        warn!("{}, skipped {} files", overflow, walk.skipped_over_capacity);
    }

    let needed = virtual_entries.len() + walk.files.len();
    shrink_if_underused(state);
    reserve_for(state, needed)?;

    state.entries.clear();
    state.entries.extend(virtual_entries);
    state.entries.extend(walk.files.into_iter().map(E::from_scanned));

    if let Some(identifier) = current {
        if let Some(entry) = state.entries.iter_mut().find(|e| e.matches(identifier)) {
            entry.set_current(true);
        }
    }

    state.scan_time = Some(SystemTime::now());
    state.valid = true;

    info!(
        "SCAN_COMPLETE: {} cache scan found {} entries in {:?}",
        E::KIND,
        state.entries.len(),
        scan_start.elapsed()
    );

    Ok(ScanReport {
        count: state.entries.len(),
        skipped_too_long: walk.skipped_too_long,
        skipped_over_capacity: walk.skipped_over_capacity,
    })
}

/// Walk `root` up to [`MAX_SCAN_DEPTH`] folders deep, keeping files with one
/// of `kind`'s extensions. At most `limit` files are kept; the rest are only
/// counted. Entries come back in walk order with the files of each folder
/// sorted by name.
pub fn walk_resource_folder(root: &Path, kind: ResourceKind, limit: usize) -> Result<WalkResult> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .max_depth(Some(MAX_SCAN_DEPTH))
        .sort_by_file_name(std::cmp::Ord::cmp)
        .build();

    let extensions = kind.extensions();
    let mut result = WalkResult::default();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("SCAN_WALK: Failed to read entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if entry.depth() == MAX_SCAN_DEPTH {
                warn!("SCAN_WALK: Max recursion depth reached at: {}", entry.path().display());
            }
            continue;
        }

        // Links to files are listed like the files themselves; linked
        // folders are not descended into.
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !has_extension(&file_name, extensions) {
            continue;
        }

        let path = entry.path();
        if let Err(e) = ensure_path_len(path) {
            warn!("SCAN_WALK: Skipping file: {}", e);
            result.skipped_too_long += 1;
            continue;
        }

        if result.files.len() >= limit {
            if result.skipped_over_capacity == 0 {
                warn!("SCAN_WALK: {} entry limit reached at: {}", kind, path.display());
            }
            result.skipped_over_capacity += 1;
            continue;
        }

        if result.files.try_reserve(1).is_err() {
            return Err(Error::AllocationFailure {
                kind,
                requested: result.files.len() + 1,
            });
        }

        result.files.push(ScannedFile {
            file_name,
            full_path: path.to_path_buf(),
            relative_path: relative_key(path, root),
            depth: entry.depth().saturating_sub(1),
        });
    }

    Ok(result)
}

/// Capacity the buffer grows to in order to hold `needed` entries: starts at
/// [`INITIAL_CAPACITY`], doubles, never exceeds [`MAX_ENTRIES`].
pub fn grown_capacity(current: usize, needed: usize) -> usize {
    let mut capacity = current;
    while capacity < needed && capacity < MAX_ENTRIES {
        capacity = if capacity == 0 {
            INITIAL_CAPACITY
        } else {
            (capacity * 2).min(MAX_ENTRIES)
        };
    }
    capacity
}

// Runs before the count is reset, so it looks at the previous scan's count.
fn shrink_if_underused<E>(state: &mut CacheState<E>) {
    if state.capacity > INITIAL_CAPACITY * 2 && state.entries.len() < state.capacity / 4 {
        let new_capacity = (state.capacity / 2).max(INITIAL_CAPACITY);
        state.entries.shrink_to(new_capacity);
        state.capacity = new_capacity;
        info!("Cache buffer shrunk to {} entries (memory optimization)", new_capacity);
    }
}

fn reserve_for<E: CacheEntry>(state: &mut CacheState<E>, needed: usize) -> Result<()> {
    let capacity = grown_capacity(state.capacity, needed);
    if capacity == state.capacity {
        return Ok(());
    }

    let additional = capacity.saturating_sub(state.entries.len());
    state
        .entries
        .try_reserve_exact(additional)
        .map_err(|_| Error::AllocationFailure {
            kind: E::KIND,
            requested: capacity,
        })?;

    debug!("{} cache buffer grown from {} to {} entries", E::KIND, state.capacity, capacity);
    state.capacity = capacity;
    Ok(())
}
