//! Send/Sync guarantees for core types.

use hybrid_index::{
    HybridConfig, HybridIndex, HybridStats, Record, SegmentIndex, SyncHybridIndex, TreeBuffer,
};
use rstest::rstest;
use static_assertions::assert_impl_all;

#[rstest]
fn indexes_are_send_sync() {
    assert_impl_all!(HybridIndex: Send, Sync);
    assert_impl_all!(SyncHybridIndex: Send, Sync);
}

#[rstest]
fn collaborators_are_send_sync() {
    assert_impl_all!(TreeBuffer: Send, Sync);
    assert_impl_all!(SegmentIndex: Send, Sync);
    assert_impl_all!(HybridConfig: Send, Sync);
    assert_impl_all!(HybridStats: Send, Sync);
    assert_impl_all!(Record: Send, Sync);
}
