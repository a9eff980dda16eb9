//! Top-level handle wiring the core components together

use std::sync::Arc;
use std::time::Duration;
use tidemark_core::{Key, ResourceId, Result, Timestamp, TxnId, Value};
use tidemark_lock::{LockConfig, LockManager, LockMode};
use tidemark_mvcc::{gc, GcStats, VersionStore};
use tidemark_txn::{PeriodicTask, Transaction, TransactionManager, TxnStats};

/// Configuration for a [`Tidemark`] instance.
#[derive(Debug, Clone)]
pub struct TidemarkConfig {
    /// Lock acquisition tuning (wait timeout, inline detection, victim
    /// policy).
    pub lock: LockConfig,
    /// Interval between background GC passes.
    pub gc_interval: Duration,
    /// Interval between background deadlock sweeps.
    pub deadlock_sweep_interval: Duration,
    /// Spawn the background maintenance tasks at construction. Off by
    /// default; passes can always be driven manually with
    /// [`Tidemark::run_gc`] and [`Tidemark::run_deadlock_detection`].
    pub start_maintenance: bool,
}

impl Default for TidemarkConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            gc_interval: Duration::from_millis(500),
            deadlock_sweep_interval: Duration::from_millis(200),
            start_maintenance: false,
        }
    }
}

/// In-process transactional store: MVCC snapshot isolation plus
/// two-phase locking.
///
/// Cheap to share: every operation takes `&self` except maintenance
/// lifecycle. Dropping the handle stops any running maintenance tasks.
pub struct Tidemark {
    store: Arc<VersionStore>,
    locks: Arc<LockManager>,
    manager: Arc<TransactionManager>,
    config: TidemarkConfig,
    gc_task: Option<PeriodicTask>,
    sweep_task: Option<PeriodicTask>,
}

impl Tidemark {
    /// Create an instance with default configuration.
    pub fn new() -> Self {
        Self::with_config(TidemarkConfig::default())
    }

    /// Create an instance with the given configuration.
    pub fn with_config(config: TidemarkConfig) -> Self {
        let store = Arc::new(VersionStore::new());
        let locks = Arc::new(LockManager::new(config.lock.clone()));
        let manager = Arc::new(TransactionManager::new(
            Arc::clone(&store),
            Arc::clone(&locks),
        ));
        let mut db = Self {
            store,
            locks,
            manager,
            config,
            gc_task: None,
            sweep_task: None,
        };
        if db.config.start_maintenance {
            db.start_maintenance();
        }
        db
    }

    /// Start the background GC and deadlock sweep tasks if they are not
    /// already running.
    pub fn start_maintenance(&mut self) {
        tracing::debug!(
            gc_interval_ms = self.config.gc_interval.as_millis() as u64,
            sweep_interval_ms = self.config.deadlock_sweep_interval.as_millis() as u64,
            "starting maintenance tasks"
        );
        if self.gc_task.is_none() {
            let store = Arc::clone(&self.store);
            let manager = Arc::clone(&self.manager);
            self.gc_task = Some(PeriodicTask::spawn(
                "tidemark-gc",
                self.config.gc_interval,
                move || {
                    gc::sweep(&store, manager.horizon());
                },
            ));
        }
        if self.sweep_task.is_none() {
            let locks = Arc::clone(&self.locks);
            self.sweep_task = Some(PeriodicTask::spawn(
                "tidemark-deadlock",
                self.config.deadlock_sweep_interval,
                move || {
                    let _ = locks.run_detection();
                },
            ));
        }
    }

    /// Stop the background maintenance tasks, joining their threads.
    /// Idempotent; also happens on drop.
    pub fn shutdown(&mut self) {
        self.gc_task = None;
        self.sweep_task = None;
    }

    /// Whether the background tasks are currently running.
    pub fn maintenance_running(&self) -> bool {
        self.gc_task.is_some() || self.sweep_task.is_some()
    }

    /// Start a snapshot-isolated transaction.
    pub fn begin(&self) -> Transaction {
        self.manager.begin()
    }

    /// Read `key` through `txn`. `Ok(None)` means no visible
    /// version, a normal negative result.
    pub fn read(&self, txn: &mut Transaction, key: &Key) -> Result<Option<Value>> {
        self.manager.read(txn, key)
    }

    /// Buffer a write in `txn`; applied at commit.
    pub fn write(&self, txn: &mut Transaction, key: Key, value: Value) -> Result<()> {
        self.manager.write(txn, key, value)
    }

    /// Commit `txn`, returning its commit timestamp.
    pub fn commit(&self, txn: &mut Transaction) -> Result<Timestamp> {
        self.manager.commit(txn)
    }

    /// Abort `txn`, discarding buffered writes and releasing locks.
    pub fn abort(&self, txn: &mut Transaction) -> Result<()> {
        self.manager.abort(txn)
    }

    /// Acquire `mode` on `resource` for `txn`, blocking on conflict.
    pub fn lock(&self, txn: &mut Transaction, resource: &ResourceId, mode: LockMode) -> Result<()> {
        self.manager.lock(txn, resource, mode)
    }

    /// Release `txn`'s lock on `resource` (closes its growing phase).
    pub fn unlock(&self, txn: &mut Transaction, resource: &ResourceId) -> Result<()> {
        self.manager.unlock(txn, resource)
    }

    /// Promote `txn`'s lock on `resource` to Exclusive.
    pub fn upgrade_lock(&self, txn: &mut Transaction, resource: &ResourceId) -> Result<()> {
        self.manager.upgrade_lock(txn, resource)
    }

    /// Run one GC pass at the current horizon.
    pub fn run_gc(&self) -> GcStats {
        gc::sweep(&self.store, self.manager.horizon())
    }

    /// Run one deadlock detection pass; returns the signalled victim,
    /// if a cycle was found.
    pub fn run_deadlock_detection(&self) -> Option<TxnId> {
        self.locks.run_detection()
    }

    /// Transaction counters.
    pub fn stats(&self) -> TxnStats {
        self.manager.stats()
    }

    /// Live versions currently stored for `key`; exposed for tests and
    /// GC observability.
    pub fn version_count(&self, key: &Key) -> usize {
        self.store.version_count(key)
    }
}

impl Default for Tidemark {
    fn default() -> Self {
        Self::new()
    }
}
