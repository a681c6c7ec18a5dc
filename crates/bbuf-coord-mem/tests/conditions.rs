//! Multi-threaded behavior of the in-process locks and conditions.

#![cfg(not(feature = "loom"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use bbuf_coord::{
    CoordError, Coordinator, DistributedCondition, DistributedLock, ReplicatedCell,
};
use bbuf_coord_mem::MemCoordinator;

#[test]
fn lock_serializes_critical_sections() {
    let coord = MemCoordinator::new();
    let lock = coord.lock("serial").unwrap();
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let lock = lock.clone();
            let inside = inside.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let _guard = lock.guard().unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn await_releases_every_hold_level_and_restores_them() {
    let coord = MemCoordinator::new();
    let lock = coord.lock("nested").unwrap();
    let go = lock.new_condition("go").unwrap();
    let cell = coord.cell(&lock, || false).unwrap();

    let waiter = {
        let lock = lock.clone();
        let go = go.clone();
        let cell = cell.clone();
        thread::spawn(move || {
            let outer = lock.guard().unwrap();
            let _inner = lock.guard().unwrap();
            while !cell.read(|v| *v).unwrap() {
                outer.await_on(&go).unwrap();
            }
            lock.hold_count()
        })
    };

    // The waiter holds the lock twice; the signaler can only get in if the
    // wait released both levels.
    thread::sleep(Duration::from_millis(20));
    {
        let _guard = lock.guard().unwrap();
        cell.update(|v| *v = true).unwrap();
        go.signal_all().unwrap();
    }

    assert_eq!(waiter.join().unwrap(), 2);
    assert!(!lock.is_held_by_current());
}

#[test]
fn signal_all_wakes_every_waiter() {
    let coord = MemCoordinator::new();
    let lock = coord.lock("broadcast").unwrap();
    let open = lock.new_condition("open").unwrap();
    let cell = coord.cell(&lock, || false).unwrap();
    let woken = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let lock = lock.clone();
            let open = open.clone();
            let cell = cell.clone();
            let woken = woken.clone();
            thread::spawn(move || {
                let guard = lock.guard().unwrap();
                while !cell.read(|v| *v).unwrap() {
                    guard.await_on(&open).unwrap();
                }
                woken.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    {
        let _guard = lock.guard().unwrap();
        cell.update(|v| *v = true).unwrap();
        open.signal_all().unwrap();
    }

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), 4);
}

#[test]
fn conditions_with_the_same_name_share_a_queue() {
    let coord = MemCoordinator::new();
    let lock = coord.lock("shared-queue").unwrap();
    let cell = coord.cell(&lock, || 0u32).unwrap();

    let waiter = {
        let coord = coord.clone();
        thread::spawn(move || {
            let lock = coord.lock("shared-queue").unwrap();
            let cond = lock.new_condition("q").unwrap();
            let cell = coord.attach_cell::<u32>(&lock).unwrap();
            let guard = lock.guard().unwrap();
            while cell.read(|v| *v).unwrap() == 0 {
                guard.await_on(&cond).unwrap();
            }
            cell.read(|v| *v).unwrap()
        })
    };

    thread::sleep(Duration::from_millis(20));
    let cond = lock.new_condition("q").unwrap();
    {
        let _guard = lock.guard().unwrap();
        cell.update(|v| *v = 7).unwrap();
        cond.signal_all().unwrap();
    }

    assert_eq!(waiter.join().unwrap(), 7);
}

#[test]
fn guard_releases_when_outage_hits_inside_critical_section() {
    let coord = MemCoordinator::new();
    let lock = coord.lock("flaky").unwrap();
    let cond = lock.new_condition("c").unwrap();

    let result = (|| -> Result<(), CoordError> {
        let _guard = lock.guard()?;
        coord.faults().set_outage(true);
        cond.signal_all()
    })();

    assert!(matches!(result, Err(CoordError::Unavailable { .. })));
    assert!(!lock.is_held_by_current());

    coord.faults().set_outage(false);
    let other = {
        let lock = lock.clone();
        thread::spawn(move || lock.guard().map(|_| ()))
    };
    assert!(other.join().unwrap().is_ok());
}
