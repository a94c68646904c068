use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding a `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "RESOURCE_CACHE_LOG";
pub const LOG_FILE_PREFIX: &str = "resource_cache.log";

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: stderr always, plus a daily rolling file
/// under `log_dir` when given. Returns `false` if a subscriber was already
/// installed, in which case nothing changes.
pub fn init_tracing(log_dir: Option<&Path>, default_level: &str) -> bool {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(build_filter(default_level));

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {}", dir.display(), e);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if LOG_GUARD.set(guard).is_err() {
            // A file writer from an earlier call is still flushing.
            return None;
        }

        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(build_filter(default_level)),
        )
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}
