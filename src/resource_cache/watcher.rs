use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::path_utils::is_relevant_change;
use crate::types::ResourceKind;
use crate::worker::{ShutdownToken, WorkerThread};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Weak;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Receiver of the refresh requests produced by [`DirectoryWatcher`].
pub trait RefreshTrigger: Send + Sync {
    fn request_refresh(&self) -> bool;
}

struct DirectoryWatch {
    kind: ResourceKind,
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

struct WatchBatch {
    kind: ResourceKind,
    result: DebounceEventResult,
}

/// Watches the font and animation folders and turns relevant changes into
/// refresh requests on a dedicated thread.
pub struct DirectoryWatcher {
    watches: Vec<DirectoryWatch>,
    shutdown: ShutdownToken,
    thread: Option<WorkerThread>,
    stop_timeout: Duration,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field(
                "watched",
                &self.watches.iter().map(|w| &w.path).collect::<Vec<_>>(),
            )
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// Watch every resource root that exists. Fails only if none of them can
    /// be watched.
    pub fn start(config: &CacheConfig, trigger: Weak<dyn RefreshTrigger>) -> Result<Self> {
        info!("WATCH_START: Starting resource watcher");
        let (batch_tx, batch_rx) = mpsc::channel::<WatchBatch>();

        let mut watches = Vec::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            let path = config.root(kind).to_path_buf();
            let batch_tx = batch_tx.clone();

            match watch_directory(kind, &path, config.watcher_debounce, batch_tx) {
                Ok(debouncer) => {
                    debug!("Watching {} folder: {}", kind.folder_name(), path.display());
                    watches.push(DirectoryWatch {
                        kind,
                        path,
                        _debouncer: debouncer,
                    });
                }
                Err(e) => {
                    warn!(
                        "Failed to open {} folder for watching: {}",
                        kind.folder_name(),
                        e
                    );
                }
            }
        }
        drop(batch_tx);

        if watches.is_empty() {
            error!("Failed to open any resource folders for watching");
            return Err(Error::NoWatchableDirectory);
        }

        let shutdown = ShutdownToken::new();
        let thread_shutdown = shutdown.clone();
        let startup_delay = config.watcher_startup_delay;
        let poll_interval = config.watcher_poll_interval;

        let thread = WorkerThread::spawn_low_priority("resource-watcher", move || {
            run_watch_loop(batch_rx, trigger, thread_shutdown, startup_delay, poll_interval);
        })?;

        info!("WATCH_START: Resource watcher started for {} folders", watches.len());
        Ok(Self {
            watches,
            shutdown,
            thread: Some(thread),
            stop_timeout: config.watcher_stop_timeout,
        })
    }

    pub fn watched_kinds(&self) -> Vec<ResourceKind> {
        self.watches.iter().map(|w| w.kind).collect()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Release the watches and wait a bounded time for the thread. A thread
    /// that does not exit in time is left behind.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        info!("WATCH_STOP: Stopping resource watcher");
        self.shutdown.cancel();
        // Dropping the debouncers cancels pending notifications and closes
        // the batch channel.
        self.watches.clear();

        match thread.join_timeout(self.stop_timeout) {
            Ok(()) => info!("WATCH_STOP: Resource watcher stopped"),
            Err(e) => warn!("WATCH_STOP: {}, leaking watcher thread", e),
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch_directory(
    kind: ResourceKind,
    path: &Path,
    debounce: Duration,
    batch_tx: mpsc::Sender<WatchBatch>,
) -> Result<Debouncer<RecommendedWatcher>> {
    if !path.is_dir() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        // The receiver is gone once the watch loop has exited.
        let _ = batch_tx.send(WatchBatch { kind, result });
    })?;

    debouncer.watcher().watch(path, RecursiveMode::Recursive)?;
    Ok(debouncer)
}

fn run_watch_loop(
    batches: Receiver<WatchBatch>,
    trigger: Weak<dyn RefreshTrigger>,
    shutdown: ShutdownToken,
    startup_delay: Duration,
    poll_interval: Duration,
) {
    info!("WATCH_LOOP: Resource watcher thread started");

    // Changes queued during the startup scan are handled after the delay.
    if shutdown.wait_timeout(startup_delay) {
        info!("WATCH_LOOP: Watcher thread aborting before start");
        return;
    }

    while !shutdown.is_cancelled() {
        let batch = match batches.recv_timeout(poll_interval) {
            Ok(batch) => batch,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if shutdown.is_cancelled() {
            break;
        }

        let events = match batch.result {
            Ok(events) => events,
            Err(e) => {
                warn!("File watcher error in {} folder: {:?}", batch.kind.folder_name(), e);
                continue;
            }
        };

        let Some(changed) = first_relevant_change(events.iter().map(|e| e.path.as_path())) else {
            continue;
        };

        info!(
            "WATCH_EVENT: Resource folder change detected: {} in {} folder",
            changed.display(),
            batch.kind.folder_name()
        );

        let Some(trigger) = trigger.upgrade() else {
            info!("WATCH_LOOP: Refresh target dropped, stopping watcher");
            break;
        };
        trigger.request_refresh();
    }

    info!("WATCH_LOOP: Resource watcher thread exiting");
}

/// First changed path in a batch that can affect a cache; one per batch is
/// enough since a refresh rescans everything.
pub fn first_relevant_change<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Option<&'a Path> {
    paths.into_iter().find(|path| is_relevant_change(path))
}
