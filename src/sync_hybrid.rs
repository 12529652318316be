//! Inline-flush hybrid: the same layering without a background worker.
//!
//! One buffer slot fronts the persistent index. When the buffered insert
//! count reaches the threshold, the inserting call itself exports, sorts,
//! persists and clears, synchronously. Lookups are one layer cheaper than in
//! the double-buffered index; the triggering insert pays the full drain
//! cost. Same single-writer, many-readers contract.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use log::debug;
use parking_lot::RwLock;

use crate::buffer::{BufferIndex, TreeBuffer};
use crate::config::{ConfigError, HybridConfig};
use crate::hybrid::HybridStats;
use crate::learned::{PersistentIndex, SegmentIndex};
use crate::record::{Key, Record, Value};

/// Hybrid learned index that flushes on the inserting thread.
pub struct SyncHybridIndex<B = TreeBuffer, P = SegmentIndex> {
    buffer: RwLock<B>,
    persistent: RwLock<P>,
    insert_count: AtomicUsize,
    flush_threshold: usize,
    flushes: AtomicU64,
    last_flush_micros: AtomicU64,
}

impl SyncHybridIndex {
    /// Create an index with the reference collaborators. Only
    /// `flush_threshold`, `epsilon` and `retrain_after` are consulted; the
    /// adaptive fields have no meaning without a background drain.
    pub fn new(config: HybridConfig) -> Result<Self, ConfigError> {
        let persistent = SegmentIndex::new(config.epsilon, config.retrain_after);
        Self::with_collaborators(TreeBuffer::new(), persistent, config)
    }
}

impl<B, P> SyncHybridIndex<B, P>
where
    B: BufferIndex,
    P: PersistentIndex,
{
    /// Create an index around caller-supplied collaborators. The buffer
    /// must start empty.
    pub fn with_collaborators(
        buffer: B,
        persistent: P,
        config: HybridConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            buffer: RwLock::new(buffer),
            persistent: RwLock::new(persistent),
            insert_count: AtomicUsize::new(0),
            flush_threshold: config.flush_threshold,
            flushes: AtomicU64::new(0),
            last_flush_micros: AtomicU64::new(0),
        })
    }

    /// Bulk-load the persistent index from key-sorted, duplicate-free
    /// records. Call once, before any insert. Returns elapsed nanoseconds.
    pub fn build(&self, data: &[Record], num_threads: usize) -> u64 {
        let started = Instant::now();
        self.persistent.write().build(data, num_threads);
        started.elapsed().as_nanos() as u64
    }

    /// Insert one record, flushing inline when the threshold is reached.
    pub fn insert(&self, record: Record, thread_id: u32) {
        self.buffer.write().insert(record, thread_id);
        let count = self.insert_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= self.flush_threshold {
            self.flush(thread_id);
        }
    }

    /// Drain the buffer into the persistent index. Clears last, so readers
    /// see every record in at least one layer throughout.
    fn flush(&self, thread_id: u32) {
        let started = Instant::now();
        let mut buffered = self.buffer.read().export();
        buffered.sort_unstable_by_key(|record| record.key);
        {
            let mut persistent = self.persistent.write();
            for record in &buffered {
                persistent.insert(*record, thread_id);
            }
        }
        self.buffer.write().clear();
        self.insert_count.store(0, Ordering::Relaxed);
        let elapsed = started.elapsed();
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.last_flush_micros
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
        debug!(
            "SyncHybridIndex: inline flush of {} records in {:?}",
            buffered.len(),
            elapsed
        );
    }

    /// Point lookup: buffer first, then the persistent index. A buffer that
    /// cannot answer falls through; the caller never sees overflow.
    pub fn equality_lookup(&self, key: Key, thread_id: u32) -> Option<Value> {
        if let Some(value) = self.buffer.read().equality_lookup(key, thread_id).value() {
            return Some(value);
        }
        self.persistent
            .read()
            .equality_lookup(key, thread_id)
            .value()
    }

    /// Wrapping sum of payloads for keys in `lo..=hi` across both layers.
    pub fn range_query(&self, lo: Key, hi: Key, thread_id: u32) -> u64 {
        if lo > hi {
            return 0;
        }
        let front = self.buffer.read().range_query(lo, hi, thread_id);
        let back = self.persistent.read().range_query(lo, hi, thread_id);
        front.wrapping_add(back)
    }

    /// Estimated footprint in bytes, summed across both layers.
    pub fn size_bytes(&self) -> usize {
        self.buffer.read().size_bytes() + self.persistent.read().size_bytes()
    }

    pub fn name(&self) -> &'static str {
        "HybridPGMLIPP"
    }

    /// Workload gate: unique keys required, concurrent writers unsupported.
    pub fn applicable(
        &self,
        unique: bool,
        _range_query: bool,
        _insert: bool,
        multithread: bool,
        _ops_filename: &str,
    ) -> bool {
        unique && !multithread
    }

    pub fn stats(&self) -> HybridStats {
        HybridStats {
            active_records: self.buffer.read().len(),
            flushing_records: 0,
            persistent_records: self.persistent.read().len(),
            flush_threshold: self.flush_threshold,
            drains: self.flushes.load(Ordering::Relaxed),
            last_drain_micros: self.last_flush_micros.load(Ordering::Relaxed),
        }
    }
}
