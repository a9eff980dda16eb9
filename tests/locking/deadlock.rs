//! Deadlock Detection Tests
//!
//! Cross-acquisition cycles are broken by victim selection:
//! - Exactly one member of a two-cycle receives Deadlock; the other
//!   completes
//! - Three-transaction cycles resolve
//! - The periodic sweep breaks cycles when inline detection is off

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tidemark::{
    Error, LockConfig, LockManager, LockMode, ResourceId, Tidemark, TidemarkConfig,
    TransactionState, TxnId, VictimPolicy,
};

fn res(name: &str) -> ResourceId {
    ResourceId::from(name)
}

fn txn(raw: u64) -> TxnId {
    TxnId::new(raw)
}

// ============================================================================
// Two-Transaction Cycle
// ============================================================================

#[test]
fn cross_deadlock_exactly_one_victim_through_facade() {
    let db = Arc::new(Tidemark::new());

    let mut t1 = db.begin();
    let mut t2 = db.begin();
    db.lock(&mut t1, &res("a"), LockMode::Exclusive).unwrap();
    db.lock(&mut t2, &res("b"), LockMode::Exclusive).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let first = {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let result = db.lock(&mut t1, &res("b"), LockMode::Exclusive);
            (t1, result)
        })
    };
    let second = {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let result = db.lock(&mut t2, &res("a"), LockMode::Exclusive);
            (t2, result)
        })
    };

    let (t1, r1) = first.join().unwrap();
    let (t2, r2) = second.join().unwrap();

    let deadlocked = [&r1, &r2]
        .iter()
        .filter(|r| matches!(r, Err(Error::Deadlock { .. })))
        .count();
    assert_eq!(deadlocked, 1, "exactly one transaction is the victim");
    assert_eq!(
        [&r1, &r2].iter().filter(|r| r.is_ok()).count(),
        1,
        "the survivor acquires its lock"
    );

    // the victim was forced into the abort path, releasing its locks
    let (victim, survivor) = if r1.is_err() { (t1, t2) } else { (t2, t1) };
    assert_eq!(victim.state(), TransactionState::Aborted);
    assert_eq!(survivor.state(), TransactionState::Active);
}

#[test]
fn youngest_member_is_chosen_as_victim() {
    let locks = Arc::new(LockManager::new(LockConfig::default()));
    locks.acquire(txn(1), &res("a"), LockMode::Exclusive).unwrap();
    locks.acquire(txn(2), &res("b"), LockMode::Exclusive).unwrap();

    // txn-1 blocks first; txn-2 then closes the cycle and, being the
    // younger member, is selected
    let older = {
        let locks = Arc::clone(&locks);
        thread::spawn(move || locks.acquire(txn(1), &res("b"), LockMode::Exclusive))
    };
    thread::sleep(Duration::from_millis(50));

    let err = locks
        .acquire(txn(2), &res("a"), LockMode::Exclusive)
        .unwrap_err();
    assert_eq!(err, Error::Deadlock { txn: txn(2) });
    locks.release_all(txn(2));

    older.join().unwrap().unwrap();
}

#[test]
fn oldest_policy_sacrifices_the_longest_running_member() {
    let locks = Arc::new(LockManager::new(LockConfig {
        victim_policy: VictimPolicy::Oldest,
        ..LockConfig::default()
    }));
    locks.acquire(txn(1), &res("a"), LockMode::Exclusive).unwrap();
    locks.acquire(txn(2), &res("b"), LockMode::Exclusive).unwrap();

    let older = {
        let locks = Arc::clone(&locks);
        thread::spawn(move || {
            let result = locks.acquire(txn(1), &res("b"), LockMode::Exclusive);
            if result.is_err() {
                locks.release_all(txn(1));
            }
            result
        })
    };
    thread::sleep(Duration::from_millis(50));

    // closing the cycle victimizes txn-1 under the Oldest policy
    locks.acquire(txn(2), &res("a"), LockMode::Exclusive).unwrap();
    let err = older.join().unwrap().unwrap_err();
    assert_eq!(err, Error::Deadlock { txn: txn(1) });
}

// ============================================================================
// Three-Transaction Cycle
// ============================================================================

#[test]
fn three_way_cycle_resolves_with_one_victim() {
    let locks = Arc::new(LockManager::new(LockConfig::default()));
    for (id, resource) in [(1u64, "a"), (2, "b"), (3, "c")] {
        locks.acquire(txn(id), &res(resource), LockMode::Exclusive).unwrap();
    }

    let barrier = Arc::new(Barrier::new(3));
    let handles: Vec<_> = [(1u64, "b"), (2, "c"), (3, "a")]
        .into_iter()
        .map(|(id, want)| {
            let locks = Arc::clone(&locks);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let result = locks.acquire(txn(id), &res(want), LockMode::Exclusive);
                if result.is_err() {
                    locks.release_all(txn(id));
                }
                result
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let victims = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Deadlock { .. })))
        .count();
    let survivors = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(victims + survivors, 3);
    assert!(victims >= 1, "at least one victim breaks the cycle");
    assert!(survivors >= 1, "the remaining members make progress");
}

// ============================================================================
// Periodic Sweep
// ============================================================================

#[test]
fn background_sweep_breaks_cycles_without_inline_detection() {
    let db = Arc::new(Tidemark::with_config(TidemarkConfig {
        lock: LockConfig {
            detect_on_block: false,
            ..LockConfig::default()
        },
        deadlock_sweep_interval: Duration::from_millis(10),
        start_maintenance: true,
        ..TidemarkConfig::default()
    }));

    let mut t1 = db.begin();
    let mut t2 = db.begin();
    db.lock(&mut t1, &res("a"), LockMode::Exclusive).unwrap();
    db.lock(&mut t2, &res("b"), LockMode::Exclusive).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles = [
        {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.lock(&mut t1, &res("b"), LockMode::Exclusive)
            })
        },
        {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                db.lock(&mut t2, &res("a"), LockMode::Exclusive)
            })
        },
    ];

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let victims = results
        .iter()
        .filter(|r| matches!(r, Err(Error::Deadlock { .. })))
        .count();
    assert_eq!(victims, 1, "the sweep task must find the cycle");
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
}

#[test]
fn manual_detection_pass_reports_the_victim() {
    let db = Arc::new(Tidemark::with_config(TidemarkConfig {
        lock: LockConfig {
            detect_on_block: false,
            ..LockConfig::default()
        },
        ..TidemarkConfig::default()
    }));

    let mut t1 = db.begin();
    let mut t2 = db.begin();
    let t2_id = t2.id();
    db.lock(&mut t1, &res("a"), LockMode::Exclusive).unwrap();
    db.lock(&mut t2, &res("b"), LockMode::Exclusive).unwrap();

    let blocked = [
        {
            let db = Arc::clone(&db);
            thread::spawn(move || db.lock(&mut t1, &res("b"), LockMode::Exclusive))
        },
        {
            let db = Arc::clone(&db);
            thread::spawn(move || db.lock(&mut t2, &res("a"), LockMode::Exclusive))
        },
    ];

    // wait until both requests are parked and the cycle exists
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    let mut victim = None;
    while victim.is_none() && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
        victim = db.run_deadlock_detection();
    }

    assert_eq!(victim, Some(t2_id), "youngest policy names txn-2");
    let results: Vec<_> = blocked.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::Deadlock { .. })))
            .count(),
        1
    );
}

// ============================================================================
// No False Positives
// ============================================================================

#[test]
fn plain_contention_is_not_reported_as_deadlock() {
    let db = Tidemark::new();
    let mut holder = db.begin();
    db.lock(&mut holder, &res("r"), LockMode::Exclusive).unwrap();
    assert_eq!(db.run_deadlock_detection(), None);
}
