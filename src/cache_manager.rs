use crate::config::{CacheConfig, SelectionSource};
use crate::resource_cache::{
    AnimationCache, DirectoryWatcher, FontCache, RefreshTrigger, ScanHook, ScannedCache,
};
use crate::types::{
    AnimationEntry, CacheEntry, CacheSnapshot, FontEntry, ResourceKind, ResourceStatistics,
};
use crate::worker::{ShutdownToken, WorkerThread};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// How [`CacheManager::shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Scan thread joined and cache memory released.
    Clean,
    /// Scan thread did not exit in time; it was abandoned and the cache
    /// memory it may still touch was left allocated.
    Abandoned,
    /// Nothing to do: the manager was already shut down.
    AlreadyShutDown,
}

/// Flags shared by the manager and its scan threads.
#[derive(Debug, Default)]
pub struct RefreshState {
    refresh_in_progress: AtomicBool,
    background_scan_complete: AtomicBool,
    scan_passes: AtomicU64,
    shutdown: ShutdownToken,
}

/// Clears the refresh flag when a scan pass ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State the scan threads need; kept apart from the manager so a stuck scan
/// thread never keeps the manager itself alive.
struct ScanContext {
    config: CacheConfig,
    selection: Arc<dyn SelectionSource>,
    fonts: FontCache,
    animations: AnimationCache,
    refresh: RefreshState,
}

impl ScanContext {
    fn current_key(&self, kind: ResourceKind) -> Option<String> {
        let identifier = self.selection.current_identifier(kind)?;
        self.config.match_key(kind, &identifier)
    }

    fn scan_cache<E: CacheEntry>(&self, cache: &ScannedCache<E>) -> bool {
        let current = self.current_key(E::KIND);
        match cache.scan(current.as_deref()) {
            Ok(report) => {
                if report.skipped_too_long > 0 || report.skipped_over_capacity > 0 {
                    warn!(
                        "{} scan skipped {} over-length and {} over-capacity files",
                        E::KIND,
                        report.skipped_too_long,
                        report.skipped_over_capacity
                    );
                }
                true
            }
            Err(e) => {
                warn!("SCAN_ERROR: {} scan failed: {}", E::KIND, e);
                false
            }
        }
    }

    /// Scan fonts then animations, stopping between the two if shutdown was
    /// requested. Must be called with the refresh flag held.
    fn run_scan_pass(&self, origin: &str) {
        let _guard = RefreshGuard(&self.refresh.refresh_in_progress);
        let pass_start = std::time::Instant::now();
        self.refresh.scan_passes.fetch_add(1, Ordering::SeqCst);
        info!("SCAN_PASS: {} resource scan started", origin);

        if self.refresh.shutdown.is_cancelled() {
            info!("SCAN_PASS: {} scan aborted (shutdown requested)", origin);
            return;
        }
        self.scan_cache(&self.fonts);

        if self.refresh.shutdown.is_cancelled() {
            info!("SCAN_PASS: {} scan aborted after fonts (shutdown requested)", origin);
            return;
        }
        self.scan_cache(&self.animations);

        self.refresh
            .background_scan_complete
            .store(true, Ordering::Release);
        info!(
            "SCAN_PASS: {} resource scan complete in {:?}",
            origin,
            pass_start.elapsed()
        );
    }
}

/// Owns the font and animation caches, the background scan thread and the
/// directory watcher.
pub struct CacheManager {
    ctx: Arc<ScanContext>,
    scan_thread: Mutex<Option<WorkerThread>>,
    watcher: Mutex<Option<DirectoryWatcher>>,
    initialized: AtomicBool,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("font_root", &self.ctx.config.font_root)
            .field("animation_root", &self.ctx.config.animation_root)
            .field("initialized", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    pub fn initialize(
        config: CacheConfig,
        selection: Arc<dyn SelectionSource>,
        start_background_scan: bool,
    ) -> Arc<Self> {
        Self::initialize_with_hook(config, selection, start_background_scan, None)
    }

    /// Like [`CacheManager::initialize`], running `scan_hook` at the start of
    /// every cache scan.
    pub fn initialize_with_hook(
        config: CacheConfig,
        selection: Arc<dyn SelectionSource>,
        start_background_scan: bool,
        scan_hook: Option<ScanHook>,
    ) -> Arc<Self> {
        info!("Initializing resource cache system");

        let fonts = FontCache::new(config.font_root.clone(), config.expiry)
            .with_scan_hook(scan_hook.clone());
        let animations = AnimationCache::new(config.animation_root.clone(), config.expiry)
            .with_scan_hook(scan_hook);

        let ctx = Arc::new(ScanContext {
            config,
            selection,
            fonts,
            animations,
            refresh: RefreshState::default(),
        });

        let manager = Arc::new(Self {
            ctx,
            scan_thread: Mutex::new(None),
            watcher: Mutex::new(None),
            initialized: AtomicBool::new(true),
        });

        if start_background_scan {
            manager.start_background_scan();
            if manager.ctx.config.watch_for_changes && !manager.start_watcher() {
                warn!("File system watcher failed to start, auto-refresh disabled");
            }
        }

        info!(
            "Resource cache initialized (background={})",
            start_background_scan
        );
        manager
    }

    fn start_background_scan(&self) {
        self.ctx
            .refresh
            .refresh_in_progress
            .store(true, Ordering::Release);

        let ctx = Arc::clone(&self.ctx);
        let spawned = WorkerThread::spawn_low_priority("resource-scan", move || {
            if ctx.refresh.shutdown.wait_timeout(ctx.config.startup_delay) {
                ctx.refresh
                    .refresh_in_progress
                    .store(false, Ordering::Release);
                info!("Background scan aborted (shutdown requested)");
                return;
            }
            ctx.run_scan_pass("Background");
        });

        match spawned {
            Ok(worker) => *self.lock_scan_thread() = Some(worker),
            Err(e) => {
                self.ctx
                    .refresh
                    .refresh_in_progress
                    .store(false, Ordering::Release);
                error!("Failed to create background scan thread: {}", e);
            }
        }
    }

    /// Start watching both resource folders. Returns `false` if neither
    /// folder could be watched.
    pub fn start_watcher(self: &Arc<Self>) -> bool {
        let mut slot = lock_or_recover(&self.watcher);
        if slot.as_ref().is_some_and(|w| w.is_running()) {
            warn!("Resource watcher already running");
            return true;
        }

        let this: Arc<dyn RefreshTrigger> = self.clone();
        match DirectoryWatcher::start(&self.ctx.config, Arc::downgrade(&this)) {
            Ok(watcher) => {
                *slot = Some(watcher);
                true
            }
            Err(e) => {
                warn!("Resource watcher unavailable: {}", e);
                false
            }
        }
    }

    /// Schedule an asynchronous rescan of both caches. Requests made while a
    /// scan is already in flight are dropped. Returns whether a scan was
    /// scheduled.
    pub fn request_refresh(&self) -> bool {
        if !self.is_ready() {
            return false;
        }

        if self
            .ctx
            .refresh
            .refresh_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Resource cache refresh already in progress, skipping");
            return false;
        }

        // Holding the slot while checking the shutdown flag keeps shutdown
        // from missing a thread spawned here.
        let mut slot = self.lock_scan_thread();
        if self.ctx.refresh.shutdown.is_cancelled() {
            self.ctx
                .refresh
                .refresh_in_progress
                .store(false, Ordering::Release);
            return false;
        }

        info!("Resource cache refresh requested (async)");
        self.ctx.fonts.invalidate();
        self.ctx.animations.invalidate();

        let ctx = Arc::clone(&self.ctx);
        let spawned = WorkerThread::spawn_low_priority("resource-refresh", move || {
            ctx.run_scan_pass("Refresh");
        });
        match spawned {
            Ok(worker) => {
                if let Some(previous) = slot.replace(worker) {
                    debug!("Previous scan thread '{}' replaced", previous.name());
                }
                true
            }
            Err(e) => {
                self.ctx
                    .refresh
                    .refresh_in_progress
                    .store(false, Ordering::Release);
                error!("Failed to create refresh thread: {}", e);
                false
            }
        }
    }

    /// Rescan both caches on the calling thread. Returns `true` if both
    /// scans succeeded.
    pub fn refresh_sync(&self) -> bool {
        if !self.is_ready() {
            return false;
        }

        info!("Resource cache refresh requested (sync)");
        let fonts_ok = self.ctx.scan_cache(&self.ctx.fonts);
        let animations_ok = self.ctx.scan_cache(&self.ctx.animations);
        fonts_ok && animations_ok
    }

    pub fn invalidate_all(&self) {
        if !self.is_ready() {
            return;
        }
        info!("Invalidating all resource caches");
        self.ctx.fonts.invalidate();
        self.ctx.animations.invalidate();
    }

    pub fn font_entries(&self) -> CacheSnapshot<FontEntry> {
        self.ctx.fonts.get_entries()
    }

    pub fn animation_entries(&self) -> CacheSnapshot<AnimationEntry> {
        self.ctx.animations.get_entries()
    }

    pub fn fonts(&self) -> &FontCache {
        &self.ctx.fonts
    }

    pub fn animations(&self) -> &AnimationCache {
        &self.ctx.animations
    }

    /// Record a user selection: the font relative path or the animation
    /// file name.
    pub fn update_current(&self, kind: ResourceKind, identifier: &str) {
        match kind {
            ResourceKind::Font => self.ctx.fonts.update_current(identifier),
            ResourceKind::Animation => self.ctx.animations.update_current(identifier),
        }
    }

    pub fn is_valid(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Font => self.ctx.fonts.is_valid(),
            ResourceKind::Animation => self.ctx.animations.is_valid(),
        }
    }

    pub fn statistics(&self) -> ResourceStatistics {
        ResourceStatistics {
            fonts: self.ctx.fonts.statistics(),
            animations: self.ctx.animations.statistics(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.ctx.config
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_background_scan_complete(&self) -> bool {
        self.ctx
            .refresh
            .background_scan_complete
            .load(Ordering::Acquire)
    }

    pub fn is_refresh_in_progress(&self) -> bool {
        self.ctx.refresh.refresh_in_progress.load(Ordering::Acquire)
    }

    pub fn is_watcher_active(&self) -> bool {
        lock_or_recover(&self.watcher)
            .as_ref()
            .is_some_and(|w| w.is_running())
    }

    /// Number of scan passes started so far (startup and refresh).
    pub fn scan_passes(&self) -> u64 {
        self.ctx.refresh.scan_passes.load(Ordering::SeqCst)
    }

    /// Stop the watcher and the scan thread, then release cache memory.
    ///
    /// Waits at most `config.shutdown_timeout` for an in-flight scan. If it
    /// does not finish, the thread is abandoned and the caches are left
    /// allocated, since the thread may still be writing to them.
    pub fn shutdown(&self) -> ShutdownOutcome {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return ShutdownOutcome::AlreadyShutDown;
        }

        info!("Shutting down resource cache system");
        self.ctx.refresh.shutdown.cancel();

        let watcher = lock_or_recover(&self.watcher).take();
        if let Some(mut watcher) = watcher {
            watcher.stop();
        }

        let scan_thread = self.lock_scan_thread().take();
        if let Some(scan_thread) = scan_thread {
            if let Err(e) = scan_thread.join_timeout(self.ctx.config.shutdown_timeout) {
                error!("{}", e);
                error!("Abandoning scan thread and leaking cache memory to avoid deadlock");
                return ShutdownOutcome::Abandoned;
            }
        }

        self.ctx.fonts.release();
        self.ctx.animations.release();

        info!("Resource cache shutdown complete");
        ShutdownOutcome::Clean
    }

    fn lock_scan_thread(&self) -> MutexGuard<'_, Option<WorkerThread>> {
        lock_or_recover(&self.scan_thread)
    }
}

impl RefreshTrigger for CacheManager {
    fn request_refresh(&self) -> bool {
        CacheManager::request_refresh(self)
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("Mutex poisoned, recovering: {:?}", poisoned);
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSelection;
    use crate::types::{CacheStatus, SPECIAL_ANIMATIONS};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Fixture {
        _dir: tempfile::TempDir,
        fonts: PathBuf,
        animations: PathBuf,
        config: CacheConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("config.ini");
        let mut config = CacheConfig::from_config_file(&config_file).unwrap();
        config.startup_delay = Duration::ZERO;
        config.watch_for_changes = false;
        config.shutdown_timeout = Duration::from_millis(300);

        let fonts = config.font_root.clone();
        let animations = config.animation_root.clone();
        fs::create_dir_all(&fonts).unwrap();
        fs::create_dir_all(&animations).unwrap();

        Fixture {
            _dir: dir,
            fonts,
            animations,
            config,
        }
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    /// Hook that, while `armed`, blocks font scans until `release` is
    /// cancelled and reports each blocked scan on the returned channel.
    fn blocking_font_hook(
        armed: Arc<AtomicBool>,
        release: ShutdownToken,
    ) -> (ScanHook, mpsc::Receiver<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let hook: ScanHook = Arc::new(move |kind| {
            if kind == ResourceKind::Font && armed.load(Ordering::SeqCst) {
                let _ = entered_tx.lock().unwrap().send(());
                while !release.wait_timeout(Duration::from_millis(10)) {}
            }
        });
        (hook, entered_rx)
    }

    #[test]
    fn test_background_scan_populates_both_caches() {
        let fx = fixture();
        touch(&fx.fonts, "Arial.ttf");
        touch(&fx.fonts, "SubDir/Bold.ttf");
        touch(&fx.animations, "cat.gif");

        let selection = Arc::new(StaticSelection::new());
        selection.set(ResourceKind::Font, Some("SubDir/Bold.ttf".to_string()));
        selection.set(ResourceKind::Animation, Some("__mem__".to_string()));

        let manager = CacheManager::initialize(fx.config.clone(), selection, true);
        assert!(manager.is_ready());
        assert!(wait_for(|| manager.is_background_scan_complete(), Duration::from_secs(10)));
        assert!(!manager.is_refresh_in_progress());
        assert_eq!(manager.scan_passes(), 1);

        let fonts = manager.font_entries();
        assert_eq!(fonts.status, CacheStatus::Ok);
        assert_eq!(fonts.entries.len(), 2);
        assert_eq!(fonts.entries[1].depth, 1);
        assert_eq!(fonts.entries[1].display_name, "Bold");
        assert!(fonts.entries[1].is_current);

        let animations = manager.animation_entries();
        assert_eq!(animations.entries.len(), SPECIAL_ANIMATIONS.len() + 1);
        assert!(animations.entries[2].is_current);

        let stats = manager.statistics();
        assert_eq!(stats.fonts.count, 2);
        assert_eq!(stats.animations.count, 4);
        assert!(stats.fonts.last_scan_time.is_some());

        assert_eq!(manager.shutdown(), ShutdownOutcome::Clean);
        assert_eq!(manager.font_entries().status, CacheStatus::Invalid);
        assert_eq!(manager.statistics().fonts.capacity, 0);
        assert_eq!(manager.shutdown(), ShutdownOutcome::AlreadyShutDown);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_scan_threads_run_at_lowered_priority() {
        let fx = fixture();
        touch(&fx.fonts, "Arial.ttf");

        let caller_nice = crate::worker::current_thread_nice();
        let (nice_tx, nice_rx) = mpsc::channel();
        let nice_tx = Mutex::new(nice_tx);
        let hook: ScanHook = Arc::new(move |kind| {
            if kind == ResourceKind::Font {
                let _ = nice_tx
                    .lock()
                    .unwrap()
                    .send(crate::worker::current_thread_nice());
            }
        });

        let manager = CacheManager::initialize_with_hook(
            fx.config.clone(),
            Arc::new(StaticSelection::new()),
            true,
            Some(hook),
        );
        let startup_nice = nice_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(wait_for(|| !manager.is_refresh_in_progress(), Duration::from_secs(10)));

        assert!(manager.request_refresh());
        let refresh_nice = nice_rx.recv_timeout(Duration::from_secs(10)).unwrap();

        if caller_nice < 19 {
            assert!(startup_nice > caller_nice);
            assert!(refresh_nice > caller_nice);
        }
        assert_eq!(manager.shutdown(), ShutdownOutcome::Clean);
    }

    #[test]
    fn test_without_background_scan_caches_start_invalid() {
        let fx = fixture();
        touch(&fx.fonts, "Arial.ttf");

        let manager = CacheManager::initialize(fx.config.clone(), Arc::new(StaticSelection::new()), false);
        assert_eq!(manager.font_entries().status, CacheStatus::Invalid);
        assert_eq!(manager.animation_entries().status, CacheStatus::Invalid);
        assert!(!manager.is_background_scan_complete());
        assert!(!manager.is_watcher_active());

        assert!(manager.refresh_sync());
        assert_eq!(manager.font_entries().status, CacheStatus::Ok);
        assert_eq!(manager.animation_entries().entries.len(), 3);
        assert_eq!(manager.scan_passes(), 0);
    }

    #[test]
    fn test_refresh_sync_reports_missing_folder() {
        let fx = fixture();
        fs::remove_dir_all(&fx.fonts).unwrap();

        let manager = CacheManager::initialize(fx.config.clone(), Arc::new(StaticSelection::new()), false);
        assert!(!manager.refresh_sync());
        assert!(!manager.is_valid(ResourceKind::Font));
        assert!(manager.is_valid(ResourceKind::Animation));
        assert_eq!(manager.animation_entries().entries.len(), 3);
    }

    #[test]
    fn test_back_to_back_requests_trigger_one_scan() {
        let fx = fixture();
        touch(&fx.fonts, "Arial.ttf");

        let release = ShutdownToken::new();
        let (hook, entered) = blocking_font_hook(Arc::new(AtomicBool::new(true)), release.clone());
        let manager = CacheManager::initialize_with_hook(
            fx.config.clone(),
            Arc::new(StaticSelection::new()),
            false,
            Some(hook),
        );

        assert!(manager.request_refresh());
        assert!(!manager.request_refresh());
        entered.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(!manager.request_refresh());
        assert!(manager.is_refresh_in_progress());

        release.cancel();
        assert!(wait_for(|| !manager.is_refresh_in_progress(), Duration::from_secs(10)));
        assert_eq!(manager.scan_passes(), 1);
        assert_eq!(manager.font_entries().status, CacheStatus::Ok);

        // A new request after completion is accepted again.
        assert!(manager.request_refresh());
        assert!(wait_for(|| !manager.is_refresh_in_progress(), Duration::from_secs(10)));
        assert_eq!(manager.scan_passes(), 2);
    }

    #[test]
    fn test_request_refresh_invalidates_until_rescan() {
        let fx = fixture();
        touch(&fx.fonts, "Arial.ttf");

        let armed = Arc::new(AtomicBool::new(false));
        let release = ShutdownToken::new();
        let (hook, entered) = blocking_font_hook(Arc::clone(&armed), release.clone());
        let manager = CacheManager::initialize_with_hook(
            fx.config.clone(),
            Arc::new(StaticSelection::new()),
            false,
            Some(hook),
        );
        assert!(manager.refresh_sync());
        assert!(manager.is_valid(ResourceKind::Animation));

        armed.store(true, Ordering::SeqCst);
        assert!(manager.request_refresh());
        entered.recv_timeout(Duration::from_secs(10)).unwrap();
        // The font scan is blocked; the animation cache waits, invalidated.
        assert!(!manager.is_valid(ResourceKind::Animation));
        assert_eq!(manager.animation_entries().status, CacheStatus::Invalid);

        release.cancel();
        assert!(wait_for(|| !manager.is_refresh_in_progress(), Duration::from_secs(10)));
        assert!(manager.is_valid(ResourceKind::Font));
        assert!(manager.is_valid(ResourceKind::Animation));
    }

    #[test]
    fn test_shutdown_with_blocked_scan_returns_within_bound() {
        let fx = fixture();
        touch(&fx.fonts, "Arial.ttf");

        let release = ShutdownToken::new();
        let (hook, entered) = blocking_font_hook(Arc::new(AtomicBool::new(true)), release.clone());
        let manager = CacheManager::initialize_with_hook(
            fx.config.clone(),
            Arc::new(StaticSelection::new()),
            true,
            Some(hook),
        );
        entered.recv_timeout(Duration::from_secs(10)).unwrap();

        let start = Instant::now();
        let outcome = manager.shutdown();
        let elapsed = start.elapsed();

        assert_eq!(outcome, ShutdownOutcome::Abandoned);
        assert!(elapsed >= fx.config.shutdown_timeout);
        assert!(elapsed < fx.config.shutdown_timeout + Duration::from_secs(2));
        assert!(!manager.is_ready());
        assert!(!manager.request_refresh());

        // Let the abandoned thread finish; it stops before the animation phase.
        release.cancel();
        assert!(wait_for(|| !manager.is_refresh_in_progress(), Duration::from_secs(10)));
        assert!(!manager.is_background_scan_complete());
        assert_eq!(manager.animation_entries().status, CacheStatus::Invalid);
    }

    #[test]
    fn test_shutdown_during_startup_delay_aborts_scan() {
        let mut fx = fixture();
        fx.config.startup_delay = Duration::from_secs(30);
        fx.config.shutdown_timeout = Duration::from_secs(5);

        let manager = CacheManager::initialize(fx.config.clone(), Arc::new(StaticSelection::new()), true);
        let start = Instant::now();
        assert_eq!(manager.shutdown(), ShutdownOutcome::Clean);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(manager.scan_passes(), 0);
    }

    #[test]
    fn test_invalidate_all_and_update_current() {
        let fx = fixture();
        touch(&fx.fonts, "a.ttf");
        touch(&fx.fonts, "b.otf");
        touch(&fx.animations, "spin.png");

        let manager = CacheManager::initialize(fx.config.clone(), Arc::new(StaticSelection::new()), false);
        assert!(manager.refresh_sync());

        manager.update_current(ResourceKind::Font, "B.OTF");
        manager.update_current(ResourceKind::Animation, "spin.png");
        assert_eq!(manager.fonts().current_entry().unwrap().file_name, "b.otf");
        assert_eq!(manager.animations().current_entry().unwrap().file_name, "spin.png");

        manager.invalidate_all();
        assert!(!manager.is_valid(ResourceKind::Font));
        assert!(!manager.is_valid(ResourceKind::Animation));
        assert_eq!(manager.statistics().fonts.count, 2);
    }

    #[test]
    fn test_watcher_change_refreshes_cache() {
        let mut fx = fixture();
        fx.config.watch_for_changes = true;
        fx.config.watcher_startup_delay = Duration::from_millis(50);
        fx.config.watcher_poll_interval = Duration::from_millis(50);
        fx.config.watcher_debounce = Duration::from_millis(50);
        fx.config.shutdown_timeout = Duration::from_secs(5);
        touch(&fx.fonts, "Arial.ttf");

        let manager = CacheManager::initialize(fx.config.clone(), Arc::new(StaticSelection::new()), true);
        assert!(wait_for(|| manager.is_background_scan_complete(), Duration::from_secs(10)));
        assert!(manager.is_watcher_active());

        touch(&fx.fonts, "Added.otf");
        assert!(wait_for(
            || {
                manager
                    .font_entries()
                    .entries
                    .iter()
                    .any(|e| e.file_name == "Added.otf")
            },
            Duration::from_secs(10)
        ));

        assert_eq!(manager.shutdown(), ShutdownOutcome::Clean);
        assert!(!manager.is_watcher_active());
    }
}
