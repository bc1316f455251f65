// Reference counting of actor storage under sequential and concurrent use

mod test_helpers;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use perch::WeakActorPtr;
use proptest::prelude::*;
use test_helpers::{TestActor, setup_test_system, spawn_counted};

#[test]
fn test_weak_outlives_payload() {
    let system = setup_test_system();
    let (ptr, drops) = spawn_counted(&system);
    assert_eq!(ptr.strong_count(), 1);
    assert_eq!(ptr.weak_count(), 1);

    let weak = ptr.downgrade();
    assert_eq!(weak.weak_count(), 2);

    drop(ptr);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert!(weak.lock().is_none());
    assert!(weak.lock().is_none());
    assert_eq!(weak.strong_count(), 0);
    assert_eq!(weak.weak_count(), 1);
    assert_eq!(system.live_storage_count(), 1);

    drop(weak);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(system.live_storage_count(), 0);
}

#[test]
fn test_last_strong_frees_storage_without_weak_handles() {
    let system = setup_test_system();
    let (ptr, drops) = spawn_counted(&system);
    let copy = ptr.clone();
    drop(ptr);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(copy);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(system.live_storage_count(), 0);
}

#[test]
fn test_payload_destroyed_before_storage() {
    let system = setup_test_system();
    let drops = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(AtomicBool::new(false));
    let self_weak: Arc<Mutex<Option<WeakActorPtr>>> = Arc::new(Mutex::new(None));

    let hook_system = system.clone();
    let hook_observed = observed.clone();
    let hook_weak = self_weak.clone();
    let actor = TestActor::new(drops.clone()).with_drop_hook(move || {
        // The storage is still allocated and the actor can no longer be revived.
        assert_eq!(hook_system.live_storage_count(), 1);
        let weak = hook_weak.lock().take();
        if let Some(weak) = weak {
            assert_eq!(weak.strong_count(), 0);
            assert!(weak.lock().is_none());
        }
        hook_observed.store(true, Ordering::SeqCst);
    });

    let ptr = system.spawn(actor);
    *self_weak.lock() = Some(ptr.downgrade());
    drop(ptr);

    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(system.live_storage_count(), 0);
}

#[test]
fn test_concurrent_clone_and_release() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 1_000;

    let system = setup_test_system();
    let (ptr, drops) = spawn_counted(&system);
    let weak = ptr.downgrade();

    thread::scope(|scope| {
        for _ in 0..THREADS {
            let ptr = ptr.clone();
            let weak = weak.clone();
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    let strong = ptr.clone();
                    let extra_weak = strong.downgrade();
                    let upgraded = weak.lock().expect("a strong handle is still held");
                    drop(extra_weak);
                    drop(upgraded);
                    drop(strong);
                }
            });
        }
    });

    assert_eq!(ptr.strong_count(), 1);
    assert_eq!(ptr.weak_count(), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(ptr);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    drop(weak);
    assert_eq!(system.live_storage_count(), 0);
}

#[test]
fn test_upgrade_races_last_release() {
    const ITERATIONS: usize = 200;

    let system = setup_test_system();
    for _ in 0..ITERATIONS {
        let (ptr, drops) = spawn_counted(&system);
        let weak = ptr.downgrade();
        let barrier = Barrier::new(2);

        thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                drop(ptr);
            });
            scope.spawn(|| {
                barrier.wait();
                let mut upgrades = 0;
                while let Some(strong) = weak.lock() {
                    assert_eq!(drops.load(Ordering::SeqCst), 0);
                    upgrades += 1;
                    drop(strong);
                    if upgrades > 10_000 {
                        break;
                    }
                }
            });
        });

        // Whoever released last destroyed the payload exactly once.
        assert!(weak.lock().is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        drop(weak);
    }
    assert_eq!(system.live_storage_count(), 0);
}

#[derive(Debug, Clone)]
enum HandleOp {
    CloneStrong(usize),
    DropStrong(usize),
    Downgrade(usize),
    DropWeak(usize),
    Upgrade(usize),
}

fn handle_op() -> impl Strategy<Value = HandleOp> {
    prop_oneof![
        any::<usize>().prop_map(HandleOp::CloneStrong),
        any::<usize>().prop_map(HandleOp::DropStrong),
        any::<usize>().prop_map(HandleOp::Downgrade),
        any::<usize>().prop_map(HandleOp::DropWeak),
        any::<usize>().prop_map(HandleOp::Upgrade),
    ]
}

proptest! {
    #[test]
    fn prop_counts_follow_live_handles(ops in prop::collection::vec(handle_op(), 0..64)) {
        let system = setup_test_system();
        let (first, drops) = spawn_counted(&system);
        let mut strongs = vec![first];
        let mut weaks: Vec<WeakActorPtr> = Vec::new();

        for op in ops {
            match op {
                HandleOp::CloneStrong(i) if !strongs.is_empty() => {
                    let copy = strongs[i % strongs.len()].clone();
                    strongs.push(copy);
                }
                HandleOp::DropStrong(i) if !strongs.is_empty() => {
                    strongs.swap_remove(i % strongs.len());
                }
                HandleOp::Downgrade(i) if !strongs.is_empty() => {
                    weaks.push(strongs[i % strongs.len()].downgrade());
                }
                HandleOp::DropWeak(i) if !weaks.is_empty() => {
                    weaks.swap_remove(i % weaks.len());
                }
                HandleOp::Upgrade(i) if !weaks.is_empty() => {
                    let upgraded = weaks[i % weaks.len()].lock();
                    prop_assert_eq!(upgraded.is_some(), !strongs.is_empty());
                    strongs.extend(upgraded);
                }
                _ => {}
            }

            if let Some(strong) = strongs.first() {
                prop_assert_eq!(strong.strong_count(), strongs.len());
                prop_assert_eq!(strong.weak_count(), weaks.len() + 1);
                prop_assert_eq!(drops.load(Ordering::SeqCst), 0);
                prop_assert_eq!(system.live_storage_count(), 1);
            } else {
                prop_assert_eq!(drops.load(Ordering::SeqCst), 1);
                match weaks.first() {
                    Some(weak) => {
                        prop_assert_eq!(weak.strong_count(), 0);
                        prop_assert_eq!(weak.weak_count(), weaks.len());
                        prop_assert_eq!(system.live_storage_count(), 1);
                    }
                    None => prop_assert_eq!(system.live_storage_count(), 0),
                }
            }
        }
    }
}
