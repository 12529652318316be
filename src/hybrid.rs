//! Hybrid coordinator: double-buffered front slots drained by a background
//! worker.
//!
//! Inserts land in the active slot. Crossing the flush threshold atomically
//! swaps the slot identities and signals the worker over a channel; the
//! worker snapshots the flushing slot, feeds it into the persistent index in
//! key order, then clears the slot. Lookups consult active, then flushing,
//! then persistent, so every record is observable in at least one layer at
//! every instant of a drain. Single-writer contract: exactly one thread may
//! call [`HybridIndex::build`] and [`HybridIndex::insert`]; any number of
//! threads may run lookups concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, unbounded};
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::buffer::{BufferIndex, TreeBuffer};
use crate::config::{ConfigError, HybridConfig};
use crate::learned::{PersistentIndex, SegmentIndex};
use crate::record::{Key, Record, Value};

/// Commands accepted by the drain worker. Closing the channel stops it.
enum Command {
    /// A rotation completed; drain the flushing slot.
    Drain,
    /// Reply once every previously signalled drain has completed.
    Barrier(Sender<()>),
}

/// Point-in-time view of layer occupancy and flush state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HybridStats {
    pub active_records: usize,
    pub flushing_records: usize,
    pub persistent_records: usize,
    pub flush_threshold: usize,
    pub drains: u64,
    pub last_drain_micros: u64,
}

/// AIMD controller for the rotation threshold.
///
/// A drain slower than `slow_drain` halves the threshold down to the floor;
/// a fast one raises it by `step` up to the ceiling.
struct ThresholdControl {
    threshold: AtomicUsize,
    floor: usize,
    ceiling: usize,
    step: usize,
    slow_drain: Duration,
    adaptive: bool,
}

impl ThresholdControl {
    fn new(config: &HybridConfig) -> Self {
        Self {
            threshold: AtomicUsize::new(config.flush_threshold),
            floor: config.threshold_floor,
            ceiling: config.threshold_ceiling,
            step: config.threshold_step,
            slow_drain: config.slow_drain(),
            adaptive: config.adaptive,
        }
    }

    fn current(&self) -> usize {
        self.threshold.load(Ordering::Relaxed)
    }

    /// Feed one drain duration back into the threshold. Only the drain
    /// worker calls this, so load/store suffices.
    fn observe(&self, elapsed: Duration) {
        if !self.adaptive {
            return;
        }
        let current = self.threshold.load(Ordering::Relaxed);
        let next = if elapsed > self.slow_drain {
            (current / 2).max(self.floor)
        } else {
            current.saturating_add(self.step).min(self.ceiling)
        };
        self.threshold.store(next, Ordering::Relaxed);
    }
}

struct Shared<B, P> {
    slots: [RwLock<B>; 2],
    persistent: RwLock<P>,
    /// Index of the slot currently receiving inserts; the other slot is the
    /// flushing one.
    active: AtomicUsize,
    /// Records inserted into the active slot since the last rotation.
    insert_count: AtomicUsize,
    /// True while a drain is pending or running. The false-to-true CAS is
    /// the sole gate into a rotation, so at most one drain is in flight.
    flushing: AtomicBool,
    /// Serialises the swap of slot identities.
    swap_lock: Mutex<()>,
    control: ThresholdControl,
    drain_chunk: usize,
    drains: AtomicU64,
    last_drain_micros: AtomicU64,
    /// Worker parks here after exporting and before persisting, letting
    /// tests observe the mid-drain state. `None` outside tests.
    drain_gate: Option<Arc<Barrier>>,
}

/// Double-buffered hybrid learned index.
pub struct HybridIndex<B = TreeBuffer, P = SegmentIndex> {
    shared: Arc<Shared<B, P>>,
    tx: Option<Sender<Command>>,
    handle: Option<JoinHandle<()>>,
}

impl HybridIndex {
    /// Create an index with the reference collaborators: [`TreeBuffer`]
    /// slots and a [`SegmentIndex`] persistent layer.
    pub fn new(config: HybridConfig) -> Result<Self, ConfigError> {
        let persistent = SegmentIndex::new(config.epsilon, config.retrain_after);
        Self::with_collaborators(TreeBuffer::new(), TreeBuffer::new(), persistent, config)
    }

    /// As [`HybridIndex::new`], with a two-party barrier the drain worker
    /// waits on mid-drain (after exporting, before persisting).
    #[cfg(feature = "test-util")]
    pub fn with_drain_gate_for_test(
        config: HybridConfig,
        gate: Arc<Barrier>,
    ) -> Result<Self, ConfigError> {
        let persistent = SegmentIndex::new(config.epsilon, config.retrain_after);
        Self::assemble(
            TreeBuffer::new(),
            TreeBuffer::new(),
            persistent,
            config,
            Some(gate),
        )
    }
}

impl<B, P> HybridIndex<B, P>
where
    B: BufferIndex + 'static,
    P: PersistentIndex + 'static,
{
    /// Create an index around caller-supplied collaborators. Both slots
    /// must start empty.
    pub fn with_collaborators(
        active: B,
        flushing: B,
        persistent: P,
        config: HybridConfig,
    ) -> Result<Self, ConfigError> {
        Self::assemble(active, flushing, persistent, config, None)
    }

    fn assemble(
        active: B,
        flushing: B,
        persistent: P,
        config: HybridConfig,
        drain_gate: Option<Arc<Barrier>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            slots: [RwLock::new(active), RwLock::new(flushing)],
            persistent: RwLock::new(persistent),
            active: AtomicUsize::new(0),
            insert_count: AtomicUsize::new(0),
            flushing: AtomicBool::new(false),
            swap_lock: Mutex::new(()),
            control: ThresholdControl::new(&config),
            drain_chunk: config.drain_chunk,
            drains: AtomicU64::new(0),
            last_drain_micros: AtomicU64::new(0),
            drain_gate,
        });
        let (tx, handle) = Self::spawn_worker(Arc::clone(&shared));
        Ok(Self {
            shared,
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Spawn the drain worker. It exits once the command channel closes,
    /// after finishing any commands already queued.
    fn spawn_worker(shared: Arc<Shared<B, P>>) -> (Sender<Command>, JoinHandle<()>) {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || {
            for command in rx {
                match command {
                    Command::Drain => {
                        Self::drain(&shared);
                        shared.flushing.store(false, Ordering::Release);
                    }
                    Command::Barrier(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        (tx, handle)
    }

    /// Move the flushing slot's contents into the persistent index.
    ///
    /// The snapshot is taken under a shared hold (the worker is the only
    /// mutator of that slot) and the slot is cleared last, so a record stays
    /// observable in flushing or persistent at every instant. Between the
    /// final chunk and the clear it is counted in both layers.
    fn drain(shared: &Shared<B, P>) {
        let started = Instant::now();
        let flushing_idx = 1 - shared.active.load(Ordering::Acquire);
        let mut buffered = shared.slots[flushing_idx].read().export();
        buffered.sort_unstable_by_key(|record| record.key);

        if let Some(gate) = &shared.drain_gate {
            gate.wait();
        }

        for chunk in buffered.chunks(shared.drain_chunk) {
            let mut persistent = shared.persistent.write();
            for record in chunk {
                persistent.insert(*record, 0);
            }
        }
        shared.slots[flushing_idx].write().clear();

        let elapsed = started.elapsed();
        shared.control.observe(elapsed);
        shared.drains.fetch_add(1, Ordering::Relaxed);
        shared
            .last_drain_micros
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
        if elapsed > shared.control.slow_drain {
            warn!(
                "HybridIndex: slow drain of {} records in {:?}, threshold now {}",
                buffered.len(),
                elapsed,
                shared.control.current()
            );
        } else {
            debug!(
                "HybridIndex: drained {} records in {:?}, threshold now {}",
                buffered.len(),
                elapsed,
                shared.control.current()
            );
        }
    }

    /// Bulk-load the persistent index from key-sorted, duplicate-free
    /// records. Call once, before any insert. Returns elapsed nanoseconds.
    pub fn build(&self, data: &[Record], num_threads: usize) -> u64 {
        let started = Instant::now();
        self.shared.persistent.write().build(data, num_threads);
        started.elapsed().as_nanos() as u64
    }

    /// Insert one record. Crossing the flush threshold rotates the slots
    /// and signals the worker; the call itself never waits on a drain.
    pub fn insert(&self, record: Record, thread_id: u32) {
        let shared = &self.shared;
        {
            let active_idx = shared.active.load(Ordering::Acquire);
            shared.slots[active_idx].write().insert(record, thread_id);
        }
        let count = shared.insert_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= shared.control.current()
            && shared
                .flushing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.rotate();
        }
    }

    /// Swap the slot identities and hand the full slot to the worker. Only
    /// reachable through the winning CAS in [`HybridIndex::insert`].
    fn rotate(&self) {
        let shared = &self.shared;
        {
            let _swap = shared.swap_lock.lock();
            let current = shared.active.load(Ordering::Acquire);
            shared.active.store(1 - current, Ordering::Release);
            shared.insert_count.store(0, Ordering::Relaxed);
        }
        match &self.tx {
            Some(tx) if tx.send(Command::Drain).is_ok() => {}
            _ => {
                shared.flushing.store(false, Ordering::Release);
                warn!("HybridIndex: rotation signalled after close; drain skipped");
            }
        }
    }

    /// Point lookup across the layers: active slot, flushing slot, then the
    /// persistent index. The flushing read is a shared hold, covering the
    /// export window of a concurrent drain. Never reports overflow; a buffer
    /// layer that cannot answer falls through to the next one.
    pub fn equality_lookup(&self, key: Key, thread_id: u32) -> Option<Value> {
        let shared = &self.shared;
        let active_idx = shared.active.load(Ordering::Acquire);
        if let Some(value) = shared.slots[active_idx]
            .read()
            .equality_lookup(key, thread_id)
            .value()
        {
            return Some(value);
        }
        if let Some(value) = shared.slots[1 - active_idx]
            .read()
            .equality_lookup(key, thread_id)
            .value()
        {
            return Some(value);
        }
        shared
            .persistent
            .read()
            .equality_lookup(key, thread_id)
            .value()
    }

    /// Wrapping sum of payloads for keys in `lo..=hi` across all layers.
    ///
    /// Not a snapshot: a record being drained may be counted in both the
    /// flushing slot and the persistent index, so the result is an upper
    /// bound that is exact whenever no drain is in flight.
    pub fn range_query(&self, lo: Key, hi: Key, thread_id: u32) -> u64 {
        if lo > hi {
            return 0;
        }
        let shared = &self.shared;
        let active_idx = shared.active.load(Ordering::Acquire);
        let front = shared.slots[active_idx].read().range_query(lo, hi, thread_id);
        let middle = shared.slots[1 - active_idx]
            .read()
            .range_query(lo, hi, thread_id);
        let back = shared.persistent.read().range_query(lo, hi, thread_id);
        front.wrapping_add(middle).wrapping_add(back)
    }

    /// Estimated footprint in bytes, summed across the three layers.
    pub fn size_bytes(&self) -> usize {
        let shared = &self.shared;
        shared.slots[0].read().size_bytes()
            + shared.slots[1].read().size_bytes()
            + shared.persistent.read().size_bytes()
    }

    pub fn name(&self) -> &'static str {
        "HybridDoubleBuffer"
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
        let shared = &self.shared;
        let active_idx = shared.active.load(Ordering::Acquire);
        HybridStats {
            active_records: shared.slots[active_idx].read().len(),
            flushing_records: shared.slots[1 - active_idx].read().len(),
            persistent_records: shared.persistent.read().len(),
            flush_threshold: shared.control.current(),
            drains: shared.drains.load(Ordering::Relaxed),
            last_drain_micros: shared.last_drain_micros.load(Ordering::Relaxed),
        }
    }

    /// Wait until every drain signalled before this call has completed.
    /// Returns `false` once the index is closed.
    pub fn quiesce(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if tx.send(Command::Barrier(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv().is_ok()
    }
}

impl<B, P> HybridIndex<B, P> {
    /// Stop the worker and join it. A drain already signalled completes
    /// first; records still buffered in the slots are discarded (the store
    /// is volatile by design).
    pub fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("HybridIndex: drain worker panicked during shutdown");
            }
        }
    }
}

impl<B, P> Drop for HybridIndex<B, P> {
    fn drop(&mut self) {
        self.close();
    }
}
