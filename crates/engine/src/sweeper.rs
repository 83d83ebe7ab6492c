//! Periodic background sweepers.
//!
//! Grounded in the adapted workspace's background scheduler: a named
//! worker thread, an `AtomicBool` shutdown flag checked on every wakeup,
//! and a `Condvar` so shutdown is prompt rather than waiting out the full
//! sleep interval. Unlike that scheduler's generic priority work queue,
//! each sweeper here runs one fixed job on a fixed interval — the
//! scheduling problem ClaudeBench's sweepers solve (liveness, delayed-task
//! rescue, leader-gated cluster jobs) doesn't need arbitrary submitted
//! work, just "run this closure every N milliseconds until told to stop".

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

struct ShutdownSignal {
    flag: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl ShutdownSignal {
    fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    /// Sleep up to `interval`, waking early if shutdown is triggered.
    /// Returns `true` if shutdown fired during the wait.
    fn wait(&self, interval: Duration) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        let mut guard = self.mutex.lock();
        let result = self.condvar.wait_for(&mut guard, interval);
        self.flag.load(Ordering::SeqCst) || !result.timed_out()
    }
}

/// Handle to one running sweeper thread.
pub struct Sweeper {
    name: &'static str,
    signal: Arc<ShutdownSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn `job` to run once immediately, then every `interval` until
    /// [`Sweeper::stop`] is called or the handle is dropped.
    pub fn spawn(name: &'static str, interval: Duration, mut job: impl FnMut() + Send + 'static) -> Self {
        let signal = Arc::new(ShutdownSignal::new());
        let thread_signal = signal.clone();
        let handle = std::thread::Builder::new()
            .name(format!("claudebench-{name}"))
            .spawn(move || {
                tracing::debug!(sweeper = name, "sweeper started");
                loop {
                    job();
                    if thread_signal.wait(interval) {
                        break;
                    }
                }
                tracing::debug!(sweeper = name, "sweeper stopped");
            })
            .expect("failed to spawn sweeper thread");
        Self {
            name,
            signal,
            handle: Some(handle),
        }
    }

    /// Signal the sweeper to stop and join its thread.
    pub fn stop(mut self) {
        self.signal.trigger();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(sweeper = self.name, "sweeper thread panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.signal.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
