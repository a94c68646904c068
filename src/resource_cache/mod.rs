// Resource cache modules - scanning, storage and change watching

pub mod core;
pub mod scanner;
pub mod watcher;

pub use core::{AnimationCache, FontCache, ScanHook, ScannedCache};
pub use scanner::{scan_into, walk_resource_folder};
pub use watcher::{DirectoryWatcher, RefreshTrigger};
