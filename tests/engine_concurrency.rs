// ==============================================
// ENGINE CONCURRENCY TESTS (integration)
// ==============================================
//
// Multi-threaded correctness for the cache engine: hot-key contention,
// mixed workloads, mid-flight subscriber registration, and event
// accounting. These require real threads and cannot live inline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Barrier, Mutex};
use std::thread;

use freqcache::engine::FreqCache;
use freqcache::event::EventKind;

// ==============================================
// Hot-key contention
// ==============================================
//
// Many threads read and update the same key. The entry must survive, every
// operation must complete, and the final value must be one that some thread
// actually wrote.

#[test]
fn hot_key_survives_heavy_contention() {
    let threads = 50;
    let iterations = 100;

    let cache: Arc<FreqCache<u64>> = Arc::new(FreqCache::new(10).unwrap());
    assert!(cache.create("hotkey", 0, None));

    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|tid| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..iterations {
                    assert!(cache.read("hotkey").is_some());
                    assert!(cache.update("hotkey", (tid as u64) * 1_000 + i, None));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let value = *cache.read("hotkey").expect("hot key must still be resident");
    let tid = value / 1_000;
    let iter = value % 1_000;
    assert!(tid < threads as u64);
    assert!(iter < iterations);

    // 1 create + (threads * iterations) successful reads + the final one.
    assert_eq!(
        cache.frequency("hotkey"),
        Some(1 + threads as u64 * iterations + 1)
    );
    cache.debug_validate_invariants();
}

// ==============================================
// Mixed workload
// ==============================================
//
// ~200 threads doing overlapping create/read/update/delete traffic against
// a small capacity. The test passing at all demonstrates deadlock freedom;
// the invariant check demonstrates structural integrity.

#[test]
fn mixed_workload_preserves_invariants() {
    let threads = 200;
    let capacity = 64;

    let cache: Arc<FreqCache<u64>> = Arc::new(FreqCache::new(capacity).unwrap());
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|tid| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50u64 {
                    let key = format!("key{}", (tid as u64 * 7 + i) % 100);
                    match (tid + i as usize) % 4 {
                        0 => {
                            cache.create(&key, i, if i % 5 == 0 { Some(1) } else { None });
                        }
                        1 => {
                            cache.read(&key);
                        }
                        2 => {
                            cache.update(&key, i, None);
                        }
                        _ => {
                            cache.delete(&key);
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(cache.len() <= capacity);
    cache.debug_validate_invariants();
}

// ==============================================
// Program-order visibility
// ==============================================
//
// A successful create followed by a read on the same thread must observe
// the created value, as long as capacity rules out eviction in between.

#[test]
fn create_is_immediately_readable_on_the_same_thread() {
    let threads = 100;
    let keys_per_thread = 50u64;

    let cache: Arc<FreqCache<u64>> =
        Arc::new(FreqCache::new(threads * keys_per_thread as usize).unwrap());
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|tid| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..keys_per_thread {
                    let key = format!("t{tid}-{i}");
                    assert!(cache.create(&key, tid as u64 * 1_000 + i, None));
                    assert_eq!(cache.read(&key).as_deref(), Some(&(tid as u64 * 1_000 + i)));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cache.len(), threads * keys_per_thread as usize);
    cache.debug_validate_invariants();
}

// ==============================================
// Mid-flight subscription
// ==============================================
//
// The bus is internally synchronized: handlers may come and go while other
// threads are publishing.

#[test]
fn subscribers_can_register_during_traffic() {
    let cache: Arc<FreqCache<u64>> = Arc::new(FreqCache::new(32).unwrap());
    let barrier = Arc::new(Barrier::new(9));

    let writers: Vec<_> = (0..8)
        .map(|tid| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200u64 {
                    let key = format!("w{tid}-{}", i % 40);
                    cache.create(&key, i, None);
                    cache.delete(&key);
                }
            })
        })
        .collect();

    let subscriber_churn = {
        let cache = cache.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            let seen = Arc::new(AtomicU64::new(0));
            for _ in 0..100 {
                let seen = seen.clone();
                let id = cache
                    .events()
                    .subscribe(move |_| {
                        seen.fetch_add(1, Ordering::Relaxed);
                    });
                assert!(cache.events().unsubscribe(id));
            }
            seen.load(Ordering::Relaxed)
        })
    };

    for h in writers {
        h.join().unwrap();
    }
    subscriber_churn.join().unwrap();
    cache.debug_validate_invariants();
}

// ==============================================
// Event accounting
// ==============================================
//
// Events are emitted under the engine lock, so across any concurrent
// history the terminal events balance the resident count exactly:
// added - (removed + evicted + expired) == len.

#[test]
fn terminal_events_balance_resident_count() {
    let cache: Arc<FreqCache<u64>> = Arc::new(FreqCache::new(16).unwrap());

    let added = Arc::new(AtomicU64::new(0));
    let gone = Arc::new(AtomicU64::new(0));
    {
        let added = added.clone();
        let gone = gone.clone();
        cache.events().subscribe(move |event| match event.kind {
            EventKind::Added => {
                added.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::Removed | EventKind::Evicted | EventKind::Expired => {
                gone.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::Updated => {}
        });
    }

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|tid| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200u64 {
                    let key = format!("k{}", (tid as u64 * 13 + i) % 48);
                    if i % 3 == 0 {
                        cache.delete(&key);
                    } else {
                        cache.create(&key, i, None);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let resident = cache.len() as u64;
    assert_eq!(
        added.load(Ordering::Relaxed) - gone.load(Ordering::Relaxed),
        resident
    );
    cache.debug_validate_invariants();
}

// ==============================================
// Subscriber panics under concurrency
// ==============================================

#[test]
fn panicking_subscriber_never_wedges_writers() {
    let cache: Arc<FreqCache<u64>> = Arc::new(FreqCache::new(8).unwrap());
    cache.events().subscribe(|event| {
        if event.kind == EventKind::Evicted {
            panic!("observer bug");
        }
    });
    let evictions = Arc::new(Mutex::new(0u64));
    {
        let evictions = evictions.clone();
        cache.events().subscribe(move |event| {
            if event.kind == EventKind::Evicted {
                *evictions.lock().unwrap() += 1;
            }
        });
    }

    let handles: Vec<_> = (0..4)
        .map(|tid| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..100u64 {
                    cache.create(&format!("t{tid}-{i}"), i, None);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // 400 distinct inserts into capacity 8 must have evicted the rest, and
    // the second subscriber saw every one despite the first panicking.
    assert_eq!(*evictions.lock().unwrap(), 400 - cache.len() as u64);
    cache.debug_validate_invariants();
}
