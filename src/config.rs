use crate::error::Result;
use crate::path_utils::{font_identifier_from_setting, resource_root};
use crate::types::ResourceKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Data older than this is still served but reported as expired.
pub const CACHE_EXPIRY: Duration = Duration::from_secs(60);
/// Pause before the startup scan so the host UI can come up first.
pub const STARTUP_SCAN_DELAY: Duration = Duration::from_millis(100);
/// Pause before the watcher starts handling events, long enough for the
/// startup scan to finish without being duplicated.
pub const WATCHER_STARTUP_DELAY: Duration = Duration::from_millis(500);
pub const WATCHER_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const WATCHER_DEBOUNCE: Duration = Duration::from_millis(200);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
pub const WATCHER_STOP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub font_root: PathBuf,
    pub animation_root: PathBuf,
    /// Prefix stripped from the stored font setting to obtain the relative
    /// key the font cache matches on. `None` uses the setting verbatim.
    pub font_path_prefix: Option<String>,
    /// Start the directory watcher along with the background scan.
    pub watch_for_changes: bool,
    pub expiry: Duration,
    pub startup_delay: Duration,
    pub watcher_startup_delay: Duration,
    pub watcher_poll_interval: Duration,
    pub watcher_debounce: Duration,
    pub shutdown_timeout: Duration,
    pub watcher_stop_timeout: Duration,
}

impl CacheConfig {
    pub fn with_roots(font_root: PathBuf, animation_root: PathBuf) -> Self {
        Self {
            font_root,
            animation_root,
            font_path_prefix: None,
            watch_for_changes: true,
            expiry: CACHE_EXPIRY,
            startup_delay: STARTUP_SCAN_DELAY,
            watcher_startup_delay: WATCHER_STARTUP_DELAY,
            watcher_poll_interval: WATCHER_POLL_INTERVAL,
            watcher_debounce: WATCHER_DEBOUNCE,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            watcher_stop_timeout: WATCHER_STOP_TIMEOUT,
        }
    }

    /// Derive both resource roots from the location of the configuration file.
    pub fn from_config_file(config_file: &Path) -> Result<Self> {
        let font_root = resource_root(config_file, ResourceKind::Font)?;
        let animation_root = resource_root(config_file, ResourceKind::Animation)?;
        Ok(Self::with_roots(font_root, animation_root))
    }

    pub fn root(&self, kind: ResourceKind) -> &Path {
        match kind {
            ResourceKind::Font => &self.font_root,
            ResourceKind::Animation => &self.animation_root,
        }
    }

    /// Map the identifier reported by the configuration layer onto the key
    /// the cache of `kind` matches on.
    pub fn match_key(&self, kind: ResourceKind, identifier: &str) -> Option<String> {
        if identifier.is_empty() {
            return None;
        }

        match (kind, self.font_path_prefix.as_deref()) {
            (ResourceKind::Font, Some(prefix)) => font_identifier_from_setting(identifier, prefix),
            _ => Some(identifier.to_string()),
        }
    }
}

/// Supplies the currently selected resource of each kind, as stored by the
/// configuration layer.
pub trait SelectionSource: Send + Sync {
    fn current_identifier(&self, kind: ResourceKind) -> Option<String>;
}

/// In-memory selection, for hosts that push selections instead of storing them.
#[derive(Debug, Default)]
pub struct StaticSelection {
    font: RwLock<Option<String>>,
    animation: RwLock<Option<String>>,
}

impl StaticSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, kind: ResourceKind, identifier: Option<String>) {
        let slot = match kind {
            ResourceKind::Font => &self.font,
            ResourceKind::Animation => &self.animation,
        };
        match slot.write() {
            Ok(mut guard) => *guard = identifier,
            Err(poisoned) => *poisoned.into_inner() = identifier,
        }
    }
}

impl SelectionSource for StaticSelection {
    fn current_identifier(&self, kind: ResourceKind) -> Option<String> {
        let slot = match kind {
            ResourceKind::Font => &self.font,
            ResourceKind::Animation => &self.animation,
        };
        match slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_file_derives_roots() {
        let config = CacheConfig::from_config_file(Path::new("/opt/app/config.ini")).unwrap();
        assert_eq!(config.root(ResourceKind::Font), Path::new("/opt/app/resources/fonts"));
        assert_eq!(
            config.root(ResourceKind::Animation),
            Path::new("/opt/app/resources/animations")
        );
        assert_eq!(config.expiry, CACHE_EXPIRY);
        assert_eq!(config.shutdown_timeout, SHUTDOWN_TIMEOUT);
    }

    #[test]
    fn test_match_key_strips_font_prefix_only() {
        let mut config = CacheConfig::with_roots(PathBuf::from("/f"), PathBuf::from("/a"));
        assert_eq!(
            config.match_key(ResourceKind::Font, "Sub/Bold.ttf"),
            Some("Sub/Bold.ttf".to_string())
        );

        config.font_path_prefix = Some("fonts\\".to_string());
        assert_eq!(
            config.match_key(ResourceKind::Font, "FONTS\\Sub\\Bold.ttf"),
            Some("Sub/Bold.ttf".to_string())
        );
        assert_eq!(config.match_key(ResourceKind::Font, "elsewhere\\Bold.ttf"), None);
        assert_eq!(
            config.match_key(ResourceKind::Animation, "fonts\\cat.gif"),
            Some("fonts\\cat.gif".to_string())
        );
        assert_eq!(config.match_key(ResourceKind::Animation, ""), None);
    }

    #[test]
    fn test_static_selection() {
        let selection = StaticSelection::new();
        assert_eq!(selection.current_identifier(ResourceKind::Font), None);

        selection.set(ResourceKind::Animation, Some("cat.gif".to_string()));
        assert_eq!(
            selection.current_identifier(ResourceKind::Animation),
            Some("cat.gif".to_string())
        );
        assert_eq!(selection.current_identifier(ResourceKind::Font), None);
    }
}
