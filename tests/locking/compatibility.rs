//! Lock Compatibility Tests
//!
//! The fixed matrix, observed end to end:
//! - Shared + Shared coexist
//! - Shared then Exclusive blocks the second until the first releases
//! - Intention modes follow the matrix

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tidemark::{
    Error, LockConfig, LockManager, LockMode, ResourceId, Tidemark, TidemarkConfig, TxnId,
};

fn res(name: &str) -> ResourceId {
    ResourceId::from(name)
}

fn txn(raw: u64) -> TxnId {
    TxnId::new(raw)
}

fn short_timeout() -> LockConfig {
    LockConfig {
        wait_timeout: Duration::from_millis(80),
        ..LockConfig::default()
    }
}

// ============================================================================
// Shared / Exclusive
// ============================================================================

#[test]
fn concurrent_shared_locks_both_succeed() {
    let db = Tidemark::new();
    let mut t1 = db.begin();
    let mut t2 = db.begin();

    db.lock(&mut t1, &res("r"), LockMode::Shared).unwrap();
    db.lock(&mut t2, &res("r"), LockMode::Shared).unwrap();

    db.commit(&mut t1).unwrap();
    db.commit(&mut t2).unwrap();
}

#[test]
fn exclusive_blocks_second_until_first_releases() {
    let db = Arc::new(Tidemark::new());
    let sequence = Arc::new(AtomicUsize::new(0));

    let mut holder = db.begin();
    db.lock(&mut holder, &res("r"), LockMode::Shared).unwrap();

    let blocked = {
        let db = Arc::clone(&db);
        let sequence = Arc::clone(&sequence);
        thread::spawn(move || {
            let mut txn = db.begin();
            db.lock(&mut txn, &res("r"), LockMode::Exclusive).unwrap();
            sequence.store(1, Ordering::SeqCst);
            db.commit(&mut txn).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(sequence.load(Ordering::SeqCst), 0, "X must wait behind S");

    // commit releases the shared lock and unblocks the writer
    db.commit(&mut holder).unwrap();
    blocked.join().unwrap();
    assert_eq!(sequence.load(Ordering::SeqCst), 1);
}

#[test]
fn exclusive_excludes_shared() {
    let locks = LockManager::new(short_timeout());
    locks.acquire(txn(1), &res("r"), LockMode::Exclusive).unwrap();
    let err = locks.acquire(txn(2), &res("r"), LockMode::Shared).unwrap_err();
    assert!(matches!(err, Error::LockTimeout { .. }));
}

// ============================================================================
// Intention Modes
// ============================================================================

#[test]
fn intention_shared_coexists_with_shared_and_intention_exclusive() {
    let locks = LockManager::new(LockConfig::default());
    locks.acquire(txn(1), &res("t"), LockMode::IntentionShared).unwrap();
    locks.acquire(txn(2), &res("t"), LockMode::Shared).unwrap();
    locks.release_all(txn(2));
    locks.acquire(txn(3), &res("t"), LockMode::IntentionExclusive).unwrap();
}

#[test]
fn intention_exclusive_rejects_shared_and_intention_exclusive() {
    let locks = LockManager::new(short_timeout());
    locks.acquire(txn(1), &res("t"), LockMode::IntentionExclusive).unwrap();

    let err = locks.acquire(txn(2), &res("t"), LockMode::Shared).unwrap_err();
    assert!(matches!(err, Error::LockTimeout { .. }));
    let err = locks
        .acquire(txn(3), &res("t"), LockMode::IntentionExclusive)
        .unwrap_err();
    assert!(matches!(err, Error::LockTimeout { .. }));
}

// ============================================================================
// Batched Granting
// ============================================================================

#[test]
fn release_grants_all_compatible_waiters_together() {
    let db = Arc::new(Tidemark::new());
    let granted = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let mut writer = db.begin();
    db.lock(&mut writer, &res("r"), LockMode::Exclusive).unwrap();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let db = Arc::clone(&db);
            let granted = Arc::clone(&granted);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut txn = db.begin();
                barrier.wait();
                db.lock(&mut txn, &res("r"), LockMode::Shared).unwrap();
                granted.fetch_add(1, Ordering::SeqCst);
                db.commit(&mut txn).unwrap();
            })
        })
        .collect();

    barrier.wait();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(granted.load(Ordering::SeqCst), 0);

    db.commit(&mut writer).unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(granted.load(Ordering::SeqCst), 3, "one release frees the whole prefix");
}

// ============================================================================
// Timeout Configuration
// ============================================================================

#[test]
fn configured_timeout_is_honored_through_the_facade() {
    let db = Tidemark::with_config(TidemarkConfig {
        lock: short_timeout(),
        ..TidemarkConfig::default()
    });

    let mut holder = db.begin();
    db.lock(&mut holder, &res("r"), LockMode::Exclusive).unwrap();

    let mut waiter = db.begin();
    let err = db.lock(&mut waiter, &res("r"), LockMode::Shared).unwrap_err();
    assert!(matches!(err, Error::LockTimeout { .. }));
    assert!(err.is_retryable());
    // the failed waiter was forced into the abort path
    assert_eq!(waiter.state(), tidemark::TransactionState::Aborted);
}
