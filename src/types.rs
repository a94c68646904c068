use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;

/// Upper bound on entries held by a single cache.
pub const MAX_ENTRIES: usize = 200;
/// First allocation made for a cache buffer.
pub const INITIAL_CAPACITY: usize = 32;
/// Deepest folder level the scanner descends into (the root is level 0).
pub const MAX_SCAN_DEPTH: usize = 10;

pub const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];
pub const ANIMATION_EXTENSIONS: &[&str] = &["gif", "webp", "png", "jpg", "jpeg", "bmp"];

/// Names of the animation options that are rendered live instead of loaded from disk.
pub const SPECIAL_ANIMATIONS: [&str; 3] = ["__logo__", "__cpu__", "__mem__"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Font,
    Animation,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Font, ResourceKind::Animation];

    pub fn folder_name(self) -> &'static str {
        match self {
            ResourceKind::Font => "fonts",
            ResourceKind::Animation => "animations",
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ResourceKind::Font => FONT_EXTENSIONS,
            ResourceKind::Animation => ANIMATION_EXTENSIONS,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Font => f.write_str("font"),
            ResourceKind::Animation => f.write_str("animation"),
        }
    }
}

/// A file found by the directory walk, before it is turned into a cache entry.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub file_name: String,
    pub full_path: PathBuf,
    /// Path relative to the scan root, always `/`-separated.
    pub relative_path: String,
    /// Folder depth below the scan root; files directly in the root have depth 0.
    pub depth: usize,
}

/// Behaviour shared by the entry types stored in a [`crate::ScannedCache`].
pub trait CacheEntry: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn from_scanned(file: ScannedFile) -> Self;

    /// Entries that exist regardless of the folder contents. They are placed
    /// ahead of every scanned file.
    fn virtual_entries() -> Vec<Self> {
        Vec::new()
    }

    /// Whether `identifier` selects this entry.
    fn matches(&self, identifier: &str) -> bool;

    fn is_current(&self) -> bool;

    fn set_current(&mut self, current: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEntry {
    pub file_name: String,
    pub full_path: PathBuf,
    /// File name without its extension.
    pub display_name: String,
    /// Match key persisted by the configuration layer.
    pub relative_path: String,
    pub is_current: bool,
    pub depth: usize,
}

impl CacheEntry for FontEntry {
    const KIND: ResourceKind = ResourceKind::Font;

    fn from_scanned(file: ScannedFile) -> Self {
        let display_name = match file.file_name.rfind('.') {
            Some(dot) => file.file_name[..dot].to_string(),
            None => file.file_name.clone(),
        };

        Self {
            file_name: file.file_name,
            full_path: file.full_path,
            display_name,
            relative_path: file.relative_path,
            is_current: false,
            depth: file.depth,
        }
    }

    // Font settings are stored with either separator and arbitrary case.
    fn matches(&self, identifier: &str) -> bool {
        let identifier = identifier.replace('\\', "/");
        self.relative_path.to_lowercase() == identifier.to_lowercase()
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationEntry {
    pub file_name: String,
    pub relative_path: String,
    /// Empty for special entries.
    pub full_path: PathBuf,
    pub is_special: bool,
    pub is_current: bool,
    pub depth: usize,
}

impl AnimationEntry {
    pub fn special(name: &str) -> Self {
        Self {
            file_name: name.to_string(),
            relative_path: name.to_string(),
            full_path: PathBuf::new(),
            is_special: true,
            is_current: false,
            depth: 0,
        }
    }
}

impl CacheEntry for AnimationEntry {
    const KIND: ResourceKind = ResourceKind::Animation;

    fn from_scanned(file: ScannedFile) -> Self {
        Self {
            file_name: file.file_name,
            relative_path: file.relative_path,
            full_path: file.full_path,
            is_special: false,
            is_current: false,
            depth: file.depth,
        }
    }

    fn virtual_entries() -> Vec<Self> {
        SPECIAL_ANIMATIONS.iter().map(|name| Self::special(name)).collect()
    }

    fn matches(&self, identifier: &str) -> bool {
        self.file_name == identifier
    }

    fn is_current(&self) -> bool {
        self.is_current
    }

    fn set_current(&mut self, current: bool) {
        self.is_current = current;
    }
}

/// Outcome of a cache read.
///
/// `Expired` still carries the last scanned data; callers show it and ask for
/// a refresh. `Invalid`, `Empty` and `Error` mean "show nothing, try later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Ok,
    Invalid,
    Expired,
    Empty,
    Error,
}

impl CacheStatus {
    #[inline]
    pub fn has_data(self) -> bool {
        matches!(self, CacheStatus::Ok | CacheStatus::Expired)
    }
}

/// Owned copy of a cache's entries, safe to keep across later scans.
#[derive(Debug, Clone)]
pub struct CacheSnapshot<E> {
    pub status: CacheStatus,
    pub entries: Vec<E>,
}

impl<E> CacheSnapshot<E> {
    pub fn empty(status: CacheStatus) -> Self {
        Self {
            status,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStatistics {
    pub count: usize,
    pub capacity: usize,
    pub last_scan_time: Option<DateTime<Local>>,
    pub valid: bool,
}

/// Statistics for both caches, as reported by [`crate::CacheManager::statistics`].
#[derive(Debug, Clone, Default)]
pub struct ResourceStatistics {
    pub fonts: CacheStatistics,
    pub animations: CacheStatistics,
}

/// Result of one successful scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub count: usize,
    pub skipped_too_long: usize,
    pub skipped_over_capacity: usize,
}
