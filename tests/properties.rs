//! Property coverage for insert persistence and layer accounting.

use hybrid_index::{
    HybridConfig, HybridIndex, LookupResult, PersistentIndex, Record, SegmentIndex,
};
use proptest::prelude::*;

fn value_for(key: u64) -> u64 {
    key.wrapping_mul(31).wrapping_add(7)
}

fn workload_config(threshold: usize) -> HybridConfig {
    HybridConfig {
        flush_threshold: threshold,
        threshold_floor: 1,
        adaptive: false,
        ..Default::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_insert_stays_observable(
        keys in prop::collection::btree_set(0u64..100_000, 1..300),
        threshold in 1usize..40,
    ) {
        let index = HybridIndex::new(workload_config(threshold)).expect("valid config");
        for &key in &keys {
            index.insert(Record::new(key, value_for(key)), 0);
        }
        // Lookups must succeed at any point relative to in-flight drains.
        for &key in &keys {
            prop_assert_eq!(index.equality_lookup(key, 0), Some(value_for(key)));
        }
        prop_assert!(index.quiesce());
        let stats = index.stats();
        prop_assert_eq!(stats.flushing_records, 0);
        prop_assert_eq!(stats.active_records + stats.persistent_records, keys.len());
        prop_assert!(index.size_bytes() >= keys.len() * 16);
    }

    #[test]
    fn range_aggregate_is_exact_once_quiescent(
        keys in prop::collection::btree_set(0u64..10_000, 1..200),
        threshold in 1usize..30,
        bounds in (0u64..10_000, 0u64..10_000),
    ) {
        let (a, b) = bounds;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let index = HybridIndex::new(workload_config(threshold)).expect("valid config");
        for &key in &keys {
            index.insert(Record::new(key, value_for(key)), 0);
        }
        prop_assert!(index.quiesce());
        let expected = keys
            .iter()
            .filter(|&&k| lo <= k && k <= hi)
            .fold(0u64, |acc, &k| acc.wrapping_add(value_for(k)));
        prop_assert_eq!(index.range_query(lo, hi, 0), expected);
    }

    #[test]
    fn learned_index_finds_every_key_despite_staleness(
        built_keys in prop::collection::btree_set(0u64..1_000_000, 0..200),
        inserted_keys in prop::collection::btree_set(0u64..1_000_000, 0..64),
    ) {
        let mut index = SegmentIndex::new(8, 16);
        let data: Vec<Record> = built_keys
            .iter()
            .map(|&k| Record::new(k, value_for(k)))
            .collect();
        index.build(&data, 1);
        for &key in &inserted_keys {
            index.insert(Record::new(key, value_for(key)), 0);
        }
        for &key in built_keys.union(&inserted_keys) {
            prop_assert_eq!(index.equality_lookup(key, 0), LookupResult::Found(value_for(key)));
        }
        prop_assert_eq!(index.len(), built_keys.union(&inserted_keys).count());
    }
}
