//! Property-based tests for the cache engine.
//!
//! Random operation sequences drive the engine while the structural
//! invariants are re-validated after every step: size never exceeds
//! capacity, every indexed key resolves to exactly one live bucket node,
//! buckets stay strictly ascending and non-empty, and frequencies only ever
//! grow until removal.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::engine::FreqCache;

fn key_strategy() -> impl Strategy<Value = String> {
    // A small key universe so operations collide often.
    "[a-f][0-9]{0,2}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum Op {
    Create { key: String, value: u32, ttl: Option<u64> },
    Read { key: String },
    Update { key: String, value: u32, ttl: Option<u64> },
    Delete { key: String },
    Advance { millis: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (key_strategy(), any::<u32>(), prop::option::of(0u64..5)).prop_map(
            |(key, value, ttl)| Op::Create { key, value, ttl }
        ),
        key_strategy().prop_map(|key| Op::Read { key }),
        (key_strategy(), any::<u32>(), prop::option::of(0u64..5)).prop_map(
            |(key, value, ttl)| Op::Update { key, value, ttl }
        ),
        key_strategy().prop_map(|key| Op::Delete { key }),
        (0u64..3000).prop_map(|millis| Op::Advance { millis }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn invariants_hold_across_random_operation_sequences(
        capacity in 1usize..12,
        ops in prop::collection::vec(op_strategy(), 1..120),
    ) {
        let clock = Arc::new(ManualClock::new());
        let cache = FreqCache::with_clock(capacity, clock.clone()).unwrap();

        for op in ops {
            match op {
                Op::Create { key, value, ttl } => {
                    cache.create(&key, value, ttl);
                }
                Op::Read { key } => {
                    cache.read(&key);
                }
                Op::Update { key, value, ttl } => {
                    cache.update(&key, value, ttl);
                }
                Op::Delete { key } => {
                    cache.delete(&key);
                }
                Op::Advance { millis } => {
                    clock.advance(Duration::from_millis(millis));
                }
            }
            prop_assert!(cache.len() <= capacity);
            cache.debug_validate_invariants();
        }
    }

    #[test]
    fn create_then_read_returns_the_stored_value(
        key in key_strategy(),
        value in any::<u32>(),
    ) {
        let cache = FreqCache::new(16).unwrap();
        prop_assert!(cache.create(&key, value, None));
        let read = cache.read(&key);
        prop_assert_eq!(read.as_deref(), Some(&value));
    }

    #[test]
    fn second_create_loses_and_first_value_survives(
        key in key_strategy(),
        first in any::<u32>(),
        second in any::<u32>(),
    ) {
        let cache = FreqCache::new(16).unwrap();
        prop_assert!(cache.create(&key, first, None));
        prop_assert!(!cache.create(&key, second, None));
        let read = cache.read(&key);
        prop_assert_eq!(read.as_deref(), Some(&first));
    }

    #[test]
    fn delete_then_create_replaces_the_value(
        key in key_strategy(),
        first in any::<u32>(),
        second in any::<u32>(),
    ) {
        let cache = FreqCache::new(16).unwrap();
        cache.create(&key, first, None);
        prop_assert!(cache.delete(&key));
        prop_assert_eq!(cache.read(&key), None);
        prop_assert!(cache.create(&key, second, None));
        let read = cache.read(&key);
        prop_assert_eq!(read.as_deref(), Some(&second));
    }

    #[test]
    fn update_preserves_frequency_and_read_bumps_it(
        key in key_strategy(),
        reads in 0usize..8,
        updated in any::<u32>(),
    ) {
        let cache = FreqCache::new(16).unwrap();
        cache.create(&key, 0, None);
        for _ in 0..reads {
            cache.read(&key);
        }
        let before = cache.frequency(&key);
        prop_assert_eq!(before, Some(reads as u64 + 1));

        prop_assert!(cache.update(&key, updated, None));
        prop_assert_eq!(cache.frequency(&key), before);

        let read = cache.read(&key);
        prop_assert_eq!(read.as_deref(), Some(&updated));
        prop_assert_eq!(cache.frequency(&key), before.map(|f| f + 1));
    }

    #[test]
    fn frequencies_never_decrease_while_resident(
        keys in prop::collection::vec(key_strategy(), 2..6),
        reads in prop::collection::vec(0usize..5, 2..6),
    ) {
        let cache = FreqCache::new(32).unwrap();
        for key in &keys {
            cache.create(key, 0, None);
        }
        for (key, &n) in keys.iter().zip(reads.iter().cycle()) {
            let before = cache.frequency(key);
            for _ in 0..n {
                cache.read(key);
            }
            let after = cache.frequency(key);
            if let (Some(before), Some(after)) = (before, after) {
                prop_assert!(after >= before);
            }
        }
    }
}
