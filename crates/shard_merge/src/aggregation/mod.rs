//! `DISTINCT` aggregation merging: COUNT/SUM/AVG/MAX/MIN recomputed over the
//! deduplicated union of all shard rows.

pub mod item;
pub mod metadata;
pub mod result;

pub use item::{
    derived_count_alias, derived_sum_alias, AggregationDistinctSelectItem, AggregationSelectItem,
    AggregationType, DERIVED_COUNT_ALIAS_PREFIX, DERIVED_SUM_ALIAS_PREFIX,
};
pub use metadata::{AggregationDistinctColumn, AggregationDistinctQueryMetaData};
pub use result::{AggregationDistinctQueryResult, DEFAULT_AVG_DECIMAL_SCALE};
