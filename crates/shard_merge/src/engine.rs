//! Picks the merge a query needs and builds it over the shard cursors.

use std::time::Instant;

use shard_common::config::MergeSectionConfig;
use shard_common::error::{ConfigError, MergeResult};
use shard_observability::MergeKind;

use crate::aggregation::{AggregationDistinctQueryResult, AggregationDistinctSelectItem};
use crate::distinct::DistinctQueryResult;
use crate::iterator::IteratorQueryResult;
use crate::query_result::QueryResult;
use crate::scatter::{drain_shards, ShardSource};
use crate::stream::StreamQueryResult;

/// What the statement asks of the merge, as decided by the parser/rewriter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// `SELECT DISTINCT` key labels; an empty list keys on whole rows.
    pub distinct_columns: Option<Vec<String>>,
    pub aggregation_distinct_items: Vec<AggregationDistinctSelectItem>,
    /// Only meaningful together with aggregation items.
    pub group_by: Vec<String>,
}

impl MergePlan {
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn distinct(labels: Vec<String>) -> Self {
        Self {
            distinct_columns: Some(labels),
            ..Self::default()
        }
    }

    pub fn aggregation_distinct(items: Vec<AggregationDistinctSelectItem>) -> Self {
        Self {
            aggregation_distinct_items: items,
            ..Self::default()
        }
    }

    pub fn with_group_by(mut self, labels: Vec<String>) -> Self {
        self.group_by = labels;
        self
    }

    pub fn kind(&self) -> MergeKind {
        if !self.aggregation_distinct_items.is_empty() {
            MergeKind::AggregationDistinct
        } else if self.distinct_columns.is_some() {
            MergeKind::Distinct
        } else {
            MergeKind::Iterator
        }
    }
}

/// Builds the merged cursor for one logical query.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    config: MergeSectionConfig,
}

impl MergeEngine {
    pub fn new(config: MergeSectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeSectionConfig {
        &self.config
    }

    /// Merge `sources` per `plan`.
    ///
    /// Plain queries stream from the shard cursors. DISTINCT and DISTINCT-aggregation
    /// queries drain every shard into memory first.
    pub fn merge(
        &self,
        plan: &MergePlan,
        sources: Vec<ShardSource>,
    ) -> MergeResult<Box<dyn QueryResult>> {
        if sources.is_empty() {
            return Err(ConfigError::NoShardResults.into());
        }
        let kind = plan.kind();
        if !plan.group_by.is_empty() && kind != MergeKind::AggregationDistinct {
            return Err(ConfigError::Invalid(
                "group-by merge requires DISTINCT aggregation items".to_string(),
            )
            .into());
        }

        let start = Instant::now();
        let shards = sources.len();
        let (merged, output_rows): (Box<dyn QueryResult>, Option<usize>) = match kind {
            MergeKind::Iterator => {
                let streams = sources
                    .into_iter()
                    .map(|s| Box::new(StreamQueryResult::new(s.shard_id, s.cursor)) as Box<dyn QueryResult>)
                    .collect();
                (Box::new(IteratorQueryResult::new(streams)?), None)
            }
            MergeKind::Distinct => {
                let labels = plan.distinct_columns.as_deref().unwrap_or_default();
                let result = DistinctQueryResult::new(self.drain(sources)?, labels)?;
                let rows = result.distinct_row_count();
                (Box::new(result), Some(rows))
            }
            MergeKind::AggregationDistinct => {
                let result = AggregationDistinctQueryResult::with_group_by(
                    self.drain(sources)?,
                    &plan.aggregation_distinct_items,
                    &plan.group_by,
                    self.config.avg_decimal_scale,
                )?;
                let rows = result.row_count();
                (Box::new(result), Some(rows))
            }
        };

        let elapsed = start.elapsed();
        shard_observability::record_merge(kind, shards, output_rows, elapsed);
        tracing::info!(
            kind = kind.as_str(),
            shards,
            output_rows = ?output_rows,
            elapsed_us = elapsed.as_micros() as u64,
            "merge ready"
        );
        Ok(merged)
    }

    fn drain(&self, sources: Vec<ShardSource>) -> MergeResult<Vec<Box<dyn QueryResult>>> {
        let (results, _) = drain_shards(sources, &self.config)?;
        Ok(results
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn QueryResult>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::AggregationType;
    use crate::cursor::{ColumnDescriptor, RowSetCursor};
    use shard_common::datum::{Datum, RawCell};
    use shard_common::types::{ShardId, SqlType, TargetType};

    fn source(id: u64, values: &[i64]) -> ShardSource {
        ShardSource::new(
            ShardId(id),
            Box::new(RowSetCursor::new(
                vec![
                    ColumnDescriptor::new("order_id", SqlType::BigInt),
                    ColumnDescriptor::new("c", SqlType::BigInt),
                ],
                values
                    .iter()
                    .map(|v| vec![Some(RawCell::Int(*v)), Some(RawCell::Int(1))])
                    .collect(),
            )),
        )
    }

    fn drain_column(result: &mut dyn QueryResult, index: usize) -> Vec<i64> {
        let mut out = Vec::new();
        while result.next().unwrap() {
            if let Datum::Int64(v) = result.get_value(index, TargetType::Int64).unwrap() {
                out.push(v);
            }
        }
        out
    }

    #[test]
    fn test_plan_kind() {
        assert_eq!(MergePlan::passthrough().kind(), MergeKind::Iterator);
        assert_eq!(MergePlan::distinct(Vec::new()).kind(), MergeKind::Distinct);
        let items = vec![AggregationDistinctSelectItem::new(AggregationType::Count, "c", "order_id")];
        assert_eq!(
            MergePlan::aggregation_distinct(items).kind(),
            MergeKind::AggregationDistinct
        );
    }

    #[test]
    fn test_passthrough_keeps_duplicates() {
        let engine = MergeEngine::default();
        let mut merged = engine
            .merge(&MergePlan::passthrough(), vec![source(0, &[1, 2]), source(1, &[2])])
            .unwrap();
        assert_eq!(drain_column(merged.as_mut(), 1), vec![1, 2, 2]);
    }

    #[test]
    fn test_distinct_dedups() {
        let engine = MergeEngine::default();
        let plan = MergePlan::distinct(vec!["order_id".to_string()]);
        let mut merged = engine
            .merge(&plan, vec![source(0, &[1, 2]), source(1, &[2, 3])])
            .unwrap();
        assert_eq!(drain_column(merged.as_mut(), 1), vec![1, 2, 3]);
    }

    #[test]
    fn test_count_distinct() {
        let engine = MergeEngine::default();
        let plan = MergePlan::aggregation_distinct(vec![AggregationDistinctSelectItem::new(
            AggregationType::Count,
            "c",
            "order_id",
        )]);
        let mut merged = engine
            .merge(&plan, vec![source(0, &[1, 2]), source(1, &[2, 3])])
            .unwrap();
        assert_eq!(drain_column(merged.as_mut(), 2), vec![3]);
    }

    #[test]
    fn test_group_by_without_aggregation_is_rejected() {
        let engine = MergeEngine::default();
        let plan = MergePlan::distinct(Vec::new()).with_group_by(vec!["order_id".to_string()]);
        let err = engine.merge(&plan, vec![source(0, &[1])]).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_no_sources() {
        let err = MergeEngine::default()
            .merge(&MergePlan::passthrough(), Vec::new())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }
}
