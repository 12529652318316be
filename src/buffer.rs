//! Write-optimized buffer slots.
//!
//! Two structurally identical slots front the hybrid index: one accepts all
//! inserts while the other is the snapshot being drained into the persistent
//! index. [`BufferIndex`] is the slot contract and [`TreeBuffer`] the
//! reference implementation. Slots are not thread-safe on their own; the
//! coordinator serialises access (single writer, worker-only drains, shared
//! reader holds).

use std::collections::BTreeMap;
use std::mem;

use crate::record::{Key, LookupResult, Record, Value};

/// Contract for one buffer slot.
pub trait BufferIndex: Send + Sync {
    /// Insert or update a record. Amortised cheap.
    fn insert(&mut self, record: Record, thread_id: u32);

    /// Point lookup. [`LookupResult::Overflow`] means "cannot answer here;
    /// ask the next layer" and callers must treat it exactly like a miss.
    fn equality_lookup(&self, key: Key, thread_id: u32) -> LookupResult;

    /// Wrapping sum of payloads for keys in `lo..=hi`.
    fn range_query(&self, lo: Key, hi: Key, thread_id: u32) -> u64;

    /// Key-ordered snapshot of the slot contents. Non-destructive; pair with
    /// [`BufferIndex::clear`] once the snapshot has been persisted.
    fn export(&self) -> Vec<Record>;

    /// Empty the slot.
    fn clear(&mut self);

    /// Number of buffered records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated in-memory footprint in bytes.
    fn size_bytes(&self) -> usize;
}

/// Ordered-map buffer slot.
///
/// A `BTreeMap` keeps inserts cheap, gives equality and range lookups
/// directly, and exports in key order for free. It can always answer
/// definitively, so it never returns [`LookupResult::Overflow`].
#[derive(Debug, Default)]
pub struct TreeBuffer {
    map: BTreeMap<Key, Value>,
}

impl TreeBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BufferIndex for TreeBuffer {
    fn insert(&mut self, record: Record, _thread_id: u32) {
        self.map.insert(record.key, record.value);
    }

    fn equality_lookup(&self, key: Key, _thread_id: u32) -> LookupResult {
        match self.map.get(&key) {
            Some(&value) => LookupResult::Found(value),
            None => LookupResult::NotFound,
        }
    }

    fn range_query(&self, lo: Key, hi: Key, _thread_id: u32) -> u64 {
        if lo > hi {
            return 0;
        }
        self.map
            .range(lo..=hi)
            .fold(0u64, |acc, (_, &value)| acc.wrapping_add(value))
    }

    fn export(&self) -> Vec<Record> {
        self.map
            .iter()
            .map(|(&key, &value)| Record { key, value })
            .collect()
    }

    fn clear(&mut self) {
        self.map.clear();
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn size_bytes(&self) -> usize {
        // Payload estimate; tree node overhead is not counted.
        self.map.len() * mem::size_of::<(Key, Value)>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn filled(pairs: &[(Key, Value)]) -> TreeBuffer {
        let mut buffer = TreeBuffer::new();
        for &(key, value) in pairs {
            buffer.insert(Record::new(key, value), 0);
        }
        buffer
    }

    #[test]
    fn insert_then_lookup() {
        let buffer = filled(&[(5, 50), (3, 30)]);
        assert_eq!(buffer.equality_lookup(5, 0), LookupResult::Found(50));
        assert_eq!(buffer.equality_lookup(3, 0), LookupResult::Found(30));
        assert_eq!(buffer.equality_lookup(4, 0), LookupResult::NotFound);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn insert_updates_existing_key() {
        let buffer = filled(&[(7, 70), (7, 71)]);
        assert_eq!(buffer.equality_lookup(7, 0), LookupResult::Found(71));
        assert_eq!(buffer.len(), 1);
    }

    #[rstest]
    #[case(2, 4, 20 + 30 + 40)]
    #[case(0, 10, 10 + 20 + 30 + 40 + 50)]
    #[case(3, 3, 30)]
    #[case(6, 9, 0)]
    #[case(4, 2, 0)]
    fn range_query_cases(#[case] lo: Key, #[case] hi: Key, #[case] expected: u64) {
        let buffer = filled(&[(1, 10), (2, 20), (3, 30), (4, 40), (5, 50)]);
        assert_eq!(buffer.range_query(lo, hi, 0), expected);
    }

    #[test]
    fn export_is_key_ordered_and_non_destructive() {
        let buffer = filled(&[(9, 90), (1, 10), (4, 40)]);
        let snapshot = buffer.export();
        assert_eq!(
            snapshot,
            vec![Record::new(1, 10), Record::new(4, 40), Record::new(9, 90)]
        );
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn clear_empties_the_slot() {
        let mut buffer = filled(&[(1, 10), (2, 20)]);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.export(), vec![]);
        assert_eq!(buffer.size_bytes(), 0);
    }
}
