//! Result merging across shard cursors.
//!
//! Every shard's result is a [`QueryResult`]. [`StreamQueryResult`] forwards onto a live
//! cursor, [`MemoryQueryResult`] drains one into memory. On top of those,
//! [`DistinctQueryResult`] deduplicates over the union of all shard rows and
//! [`AggregationDistinctQueryResult`] recomputes `COUNT`/`SUM`/`AVG(DISTINCT ..)` from that
//! union rather than adding up per-shard partial aggregates. [`MergeEngine`] picks the
//! right merge for a [`MergePlan`].

pub mod aggregation;
pub mod codec;
pub mod cursor;
pub mod distinct;
pub mod engine;
mod gather;
pub mod iterator;
pub mod memory;
pub mod metadata;
pub mod query_result;
pub mod scatter;
pub mod stream;

pub use aggregation::{
    AggregationDistinctQueryMetaData, AggregationDistinctQueryResult,
    AggregationDistinctSelectItem, AggregationSelectItem, AggregationType,
};
pub use codec::{InputStream, ValueCodec};
pub use cursor::{ColumnDescriptor, RowSetCursor, ShardCursor};
pub use distinct::DistinctQueryResult;
pub use engine::{MergeEngine, MergePlan};
pub use iterator::IteratorQueryResult;
pub use memory::{MemoryQueryResult, ResultData, RowBudget};
pub use metadata::{ColumnMetaData, QueryResultMetaData};
pub use query_result::QueryResult;
pub use scatter::{drain_shards, DrainMetrics, ShardSource};
pub use stream::StreamQueryResult;

/// Lifecycle of a buffered merge.
///
/// `Constructed → Draining → Ready → Iterating → Exhausted`. Everything up to `Ready`
/// happens inside the constructor; afterwards only the cursor moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Constructed,
    Draining,
    Ready,
    Iterating,
    Exhausted,
}

impl MergeState {
    pub(crate) fn advance(&mut self, next: MergeState) {
        if *self != next {
            tracing::debug!(from = ?*self, to = ?next, "merge state");
            *self = next;
        }
    }
}
