//! Hybrid learned index: write-optimized front buffers drained into a
//! read-optimized learned index by a background worker.
//!
//! [`HybridIndex`] routes every insert into a mutable active slot. Once the
//! slot holds enough records, its identity is swapped with a second,
//! empty slot and a background worker drains the full one into the
//! persistent [`SegmentIndex`], so insert latency stays flat while lookups
//! remain close to a static learned index. [`SyncHybridIndex`] offers the
//! same layering with the drain performed inline on the inserting thread.
//!
//! Both indexes are generic over their collaborators: any [`BufferIndex`]
//! can serve as a slot and any [`PersistentIndex`] as the bottom layer.
//!
//! ```
//! use hybrid_index::{HybridConfig, HybridIndex, Record};
//!
//! let index = HybridIndex::new(HybridConfig::default()).expect("valid config");
//! index.build(&[Record::new(1, 10), Record::new(2, 20)], 1);
//! index.insert(Record::new(5, 50), 0);
//! assert_eq!(index.equality_lookup(2, 0), Some(20));
//! assert_eq!(index.equality_lookup(5, 0), Some(50));
//! assert_eq!(index.range_query(1, 5, 0), 80);
//! ```

mod buffer;
mod config;
mod hybrid;
mod learned;
mod record;
mod sync_hybrid;

pub use buffer::{BufferIndex, TreeBuffer};
pub use config::{ConfigError, HybridConfig};
pub use hybrid::{HybridIndex, HybridStats};
pub use learned::{PersistentIndex, SegmentIndex};
pub use record::{Key, LookupResult, NOT_FOUND, OVERFLOW, Record, Value};
pub use sync_hybrid::SyncHybridIndex;
