use std::collections::HashMap;

use shard_common::error::{ColumnError, ConfigError, MergeResult};

use super::item::{AggregationDistinctSelectItem, AggregationType};
use crate::metadata::QueryResultMetaData;

/// One registered `DISTINCT` aggregation column, with every index resolved (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationDistinctColumn {
    pub index: usize,
    pub label: String,
    pub aggregation_type: AggregationType,
    pub distinct_index: usize,
    pub derived_count_index: Option<usize>,
    pub derived_sum_index: Option<usize>,
}

/// Index/label bookkeeping for the `DISTINCT` aggregation columns of a result.
#[derive(Debug, Clone)]
pub struct AggregationDistinctQueryMetaData {
    columns: Vec<AggregationDistinctColumn>,
    column_count: usize,
    by_index: HashMap<usize, usize>,
    by_label: HashMap<String, usize>,
    by_folded_label: HashMap<String, usize>,
    by_derived_count: HashMap<usize, usize>,
    by_derived_sum: HashMap<usize, usize>,
}

impl AggregationDistinctQueryMetaData {
    /// Resolve every item against `metadata`. Any label the result does not carry fails
    /// with a configuration error.
    pub fn new(
        items: &[AggregationDistinctSelectItem],
        metadata: &QueryResultMetaData,
    ) -> MergeResult<Self> {
        let resolve = |label: &str| {
            metadata
                .column_index(label)
                .map_err(|_| ConfigError::UnknownAggregationColumn(label.to_string()))
        };

        let mut this = Self {
            columns: Vec::with_capacity(items.len()),
            column_count: metadata.column_count(),
            by_index: HashMap::new(),
            by_label: HashMap::new(),
            by_folded_label: HashMap::new(),
            by_derived_count: HashMap::new(),
            by_derived_sum: HashMap::new(),
        };
        for item in items {
            let mut column = AggregationDistinctColumn {
                index: resolve(item.column_label())?,
                label: item.column_label().to_string(),
                aggregation_type: item.aggregation_type(),
                distinct_index: resolve(&item.distinct_column_label)?,
                derived_count_index: None,
                derived_sum_index: None,
            };
            for derived in &item.derived_items {
                let index = resolve(&derived.column_label)?;
                match derived.aggregation_type {
                    AggregationType::Count => column.derived_count_index = Some(index),
                    AggregationType::Sum => column.derived_sum_index = Some(index),
                    other => {
                        return Err(ConfigError::Invalid(format!(
                            "derived column {} of {} must be COUNT or SUM, got {other}",
                            derived.column_label,
                            item.column_label()
                        ))
                        .into())
                    }
                }
            }

            let position = this.columns.len();
            this.by_index.insert(column.index, position);
            this.by_label.insert(column.label.clone(), position);
            this.by_folded_label
                .insert(column.label.to_ascii_lowercase(), position);
            if let Some(index) = column.derived_count_index {
                this.by_derived_count.insert(index, position);
            }
            if let Some(index) = column.derived_sum_index {
                this.by_derived_sum.insert(index, position);
            }
            this.columns.push(column);
        }
        Ok(this)
    }

    pub fn columns(&self) -> &[AggregationDistinctColumn] {
        &self.columns
    }

    /// Position in `columns()` of the aggregation column at `index`.
    pub(crate) fn position_of_index(&self, index: usize) -> Option<usize> {
        self.by_index.get(&index).copied()
    }

    pub(crate) fn position_of_derived_count(&self, index: usize) -> Option<usize> {
        self.by_derived_count.get(&index).copied()
    }

    pub(crate) fn position_of_derived_sum(&self, index: usize) -> Option<usize> {
        self.by_derived_sum.get(&index).copied()
    }

    fn position_of_label(&self, label: &str) -> Option<usize> {
        self.by_label
            .get(label)
            .or_else(|| self.by_folded_label.get(&label.to_ascii_lowercase()))
            .copied()
    }

    fn unknown_index(&self, index: usize) -> ColumnError {
        ColumnError::UnknownColumnIndex {
            index,
            column_count: self.column_count,
        }
    }

    pub fn is_aggregation_distinct_column_index(&self, index: usize) -> bool {
        self.by_index.contains_key(&index)
    }

    pub fn is_aggregation_distinct_column_label(&self, label: &str) -> bool {
        self.position_of_label(label).is_some()
    }

    pub fn is_derived_count_column_index(&self, index: usize) -> bool {
        self.by_derived_count.contains_key(&index)
    }

    pub fn is_derived_sum_column_index(&self, index: usize) -> bool {
        self.by_derived_sum.contains_key(&index)
    }

    pub fn aggregation_type(&self, index: usize) -> MergeResult<AggregationType> {
        self.position_of_index(index)
            .map(|p| self.columns[p].aggregation_type)
            .ok_or_else(|| self.unknown_index(index).into())
    }

    /// Column index of the aggregation registered under `label`.
    pub fn aggregation_distinct_column_index(&self, label: &str) -> MergeResult<usize> {
        self.position_of_label(label)
            .map(|p| self.columns[p].index)
            .ok_or_else(|| ColumnError::UnknownColumnLabel(label.to_string()).into())
    }

    /// Column index of the AVG that owns the derived SUM column at `derived_sum_index`.
    pub fn aggregation_distinct_column_index_by_derived_sum(
        &self,
        derived_sum_index: usize,
    ) -> MergeResult<usize> {
        self.position_of_derived_sum(derived_sum_index)
            .map(|p| self.columns[p].index)
            .ok_or_else(|| self.unknown_index(derived_sum_index).into())
    }

    /// Column index of the AVG that owns the derived COUNT column at `derived_count_index`.
    pub fn aggregation_distinct_column_index_by_derived_count(
        &self,
        derived_count_index: usize,
    ) -> MergeResult<usize> {
        self.position_of_derived_count(derived_count_index)
            .map(|p| self.columns[p].index)
            .ok_or_else(|| self.unknown_index(derived_count_index).into())
    }

    /// Index of the column whose values are deduplicated for the aggregation at `index`.
    pub fn distinct_column_index(&self, index: usize) -> MergeResult<usize> {
        self.position_of_index(index)
            .map(|p| self.columns[p].distinct_index)
            .ok_or_else(|| self.unknown_index(index).into())
    }
}
