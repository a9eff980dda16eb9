//! Cancellable periodic maintenance tasks
//!
//! Background work (the GC sweep and the deadlock sweep) runs on named
//! worker threads executing a closure at a fixed interval. A task is
//! explicitly schedulable and cancellable: `stop` sets the stop flag,
//! wakes the worker out of its interval sleep, and joins the thread, so
//! shutdown is prompt and clean. Dropping the task stops it.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

struct TaskShared {
    stop: AtomicBool,
    wake: Condvar,
    gate: Mutex<()>,
    runs: AtomicU64,
}

/// A named worker thread running a closure at a fixed interval.
pub struct PeriodicTask {
    shared: Arc<TaskShared>,
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl PeriodicTask {
    /// Spawn `work` on a thread called `name`, re-running it every
    /// `interval` until stopped. The first run happens immediately.
    pub fn spawn(name: &str, interval: Duration, mut work: impl FnMut() + Send + 'static) -> Self {
        let shared = Arc::new(TaskShared {
            stop: AtomicBool::new(false),
            wake: Condvar::new(),
            gate: Mutex::new(()),
            runs: AtomicU64::new(0),
        });
        let worker_shared = Arc::clone(&shared);
        let thread_name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                loop {
                    if worker_shared.stop.load(Ordering::Acquire) {
                        break;
                    }
                    work();
                    worker_shared.runs.fetch_add(1, Ordering::Release);

                    let mut gate = worker_shared.gate.lock();
                    // Re-check under the gate: stop() holds it while
                    // notifying, so a worker here either sees the flag or
                    // is already parked when the wake arrives.
                    if worker_shared.stop.load(Ordering::Acquire) {
                        break;
                    }
                    worker_shared.wake.wait_for(&mut gate, interval);
                }
                tracing::debug!(task = %thread_name, "maintenance task stopped");
            })
            .expect("failed to spawn maintenance thread");

        tracing::debug!(task = name, interval_ms = interval.as_millis() as u64, "maintenance task started");
        Self {
            shared,
            handle: Some(handle),
            name: name.to_string(),
        }
    }

    /// The thread name the task was spawned with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Completed runs of the closure so far.
    pub fn runs(&self) -> u64 {
        self.shared.runs.load(Ordering::Acquire)
    }

    /// Signal the worker to stop and join it. Idempotent.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        {
            let _gate = self.shared.gate.lock();
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
