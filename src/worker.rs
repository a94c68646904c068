use crate::error::{Error, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{debug, error, warn};

/// Cooperative shutdown signal shared between an owner and its threads.
///
/// Threads poll [`ShutdownToken::is_cancelled`] between phases and use
/// [`ShutdownToken::wait_timeout`] instead of `thread::sleep` so a pending
/// shutdown cuts their delays short.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        let mut cancelled = match flag.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Shutdown mutex poisoned, recovering: {:?}", poisoned);
                poisoned.into_inner()
            }
        };
        *cancelled = true;
        condvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        match flag.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sleep for up to `timeout`. Returns `true` if the token was cancelled
    /// before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let guard = match flag.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match condvar.wait_timeout_while(guard, timeout, |cancelled| !*cancelled) {
            Ok((guard, _)) => *guard,
            Err(poisoned) => {
                error!("Condvar wait poisoned, recovering: {:?}", poisoned);
                *poisoned.into_inner().0
            }
        }
    }
}

/// A named OS thread that can be joined with an upper bound on the wait.
#[derive(Debug)]
pub struct WorkerThread {
    name: String,
    handle: thread::JoinHandle<()>,
    // Disconnects when the thread exits, including by panic.
    exited: Receiver<()>,
}

impl WorkerThread {
    pub fn spawn<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn_with_priority(name, None, f)
    }

    /// Spawn a thread that drops itself to the lowest scheduling priority
    /// before running `f`, so scans never compete with the UI.
    pub fn spawn_low_priority<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn_with_priority(name, Some(ThreadPriority::Min), f)
    }

    fn spawn_with_priority<F>(name: &str, priority: Option<ThreadPriority>, f: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (exit_signal, exited) = mpsc::channel::<()>();
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _exit_signal = exit_signal;
                if let Some(priority) = priority {
                    apply_priority(&thread_name, priority);
                }
                f();
            })
            .map_err(|source| Error::ThreadSpawn {
                name: name.to_string(),
                source,
            })?;

        Ok(Self {
            name: name.to_string(),
            handle,
            exited,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait up to `timeout` for the thread to exit. On timeout the handle is
    /// dropped, detaching the thread, and `ThreadJoinTimeout` is returned.
    pub fn join_timeout(self, timeout: Duration) -> Result<()> {
        if self.handle.thread().id() == thread::current().id() {
            warn!("Thread '{}' cannot join itself, detaching", self.name);
            return Ok(());
        }

        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    error!("Thread '{}' panicked", self.name);
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::ThreadJoinTimeout {
                name: self.name,
                timeout,
            }),
        }
    }
}

// A thread left at its default priority still works, so failures only warn.
fn apply_priority(name: &str, priority: ThreadPriority) {
    match set_current_thread_priority(priority) {
        Ok(()) => debug!("Thread '{}' running at lowered priority", name),
        Err(e) => warn!("Failed to set priority of thread '{}': {:?}", name, e),
    }
}

/// Nice value of the calling thread, read from procfs.
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn current_thread_nice() -> i32 {
    let stat = std::fs::read_to_string("/proc/thread-self/stat").unwrap();
    // Fields after the parenthesised command name start at field 3; nice is 19.
    let rest = &stat[stat.rfind(')').unwrap() + 1..];
    rest.split_whitespace().nth(16).unwrap().parse().unwrap()
}
