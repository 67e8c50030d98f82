use std::sync::Arc;

use chrono::FixedOffset;

use shard_common::datum::{decimal_div, Datum};
use shard_common::error::{CodecError, ColumnError, ConfigError, MergeResult};
use shard_common::types::{StreamKind, TargetType};

use super::item::{AggregationDistinctSelectItem, AggregationType};
use super::metadata::AggregationDistinctQueryMetaData;
use crate::codec::{self, InputStream};
use crate::distinct::DistinctQueryResult;
use crate::gather::{cmp_datum, sum_datums};
use crate::metadata::QueryResultMetaData;
use crate::query_result::QueryResult;
use crate::MergeState;

/// Fraction digits of a decimal `AVG(DISTINCT ..)` when no configuration says otherwise.
pub const DEFAULT_AVG_DECIMAL_SCALE: u8 = 4;

/// Running state of one `DISTINCT` aggregate over one group. NULLs are skipped.
#[derive(Debug, Clone, Default)]
struct DistinctAccumulator {
    count: i64,
    sum: Option<Datum>,
    min: Option<Datum>,
    max: Option<Datum>,
}

impl DistinctAccumulator {
    fn accept(&mut self, value: &Datum, aggregation_type: AggregationType) -> Result<(), CodecError> {
        if value.is_null() {
            return Ok(());
        }
        self.count += 1;
        match aggregation_type {
            AggregationType::Count => {}
            AggregationType::Sum | AggregationType::Avg => {
                let acc = self.sum.take().unwrap_or(Datum::Int64(0));
                self.sum = Some(sum_datums(&acc, value)?);
            }
            AggregationType::Max => {
                if self.max.as_ref().map_or(true, |m| cmp_datum(value, m).is_gt()) {
                    self.max = Some(value.clone());
                }
            }
            AggregationType::Min => {
                if self.min.as_ref().map_or(true, |m| cmp_datum(value, m).is_lt()) {
                    self.min = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn finish(
        self,
        aggregation_type: AggregationType,
        avg_decimal_scale: u8,
    ) -> Result<Recomputed, CodecError> {
        let sum = self.sum.unwrap_or(Datum::Null);
        let value = match aggregation_type {
            AggregationType::Count => Datum::Int64(self.count),
            AggregationType::Sum => sum.clone(),
            AggregationType::Avg => average(&sum, self.count, avg_decimal_scale)?,
            AggregationType::Max => self.max.unwrap_or(Datum::Null),
            AggregationType::Min => self.min.unwrap_or(Datum::Null),
        };
        Ok(Recomputed {
            value,
            count: self.count,
            sum,
        })
    }
}

/// A decimal SUM averages to a decimal at `avg_decimal_scale`; any other sum to Float64.
fn average(sum: &Datum, count: i64, avg_decimal_scale: u8) -> Result<Datum, CodecError> {
    if count == 0 || sum.is_null() {
        return Ok(Datum::Null);
    }
    match sum {
        Datum::Decimal(m, s) => decimal_div(*m, *s, i128::from(count), 0, avg_decimal_scale)
            .ok_or_else(|| CodecError::ValueOutOfRange {
                value: format!("{sum} / {count}"),
                target: "decimal",
            }),
        _ => Ok(Datum::Float64(sum.as_f64().unwrap_or_default() / count as f64)),
    }
}

/// Recomputed values of one aggregation column for one output row.
#[derive(Debug, Clone, PartialEq)]
struct Recomputed {
    value: Datum,
    /// Distinct non-NULL values, served on the derived COUNT column.
    count: i64,
    /// Sum of the distinct values, served on the derived SUM column.
    sum: Datum,
}

/// Recomputes `DISTINCT` aggregates over the union of all shard rows.
///
/// Rows are grouped on the group-by columns. Within each group the values of every
/// aggregation's distinct column are deduplicated across shards, and COUNT, SUM, AVG,
/// MAX and MIN are computed from that set. Reads of an aggregation column or of an AVG's
/// derived COUNT/SUM column return the recomputed value; every other column reads from the
/// first row of the group.
///
/// Without group-by columns the result has exactly one row, even when no shard returned
/// any.
pub struct AggregationDistinctQueryResult {
    groups: DistinctQueryResult,
    metadata: AggregationDistinctQueryMetaData,
    /// Per output row, aligned with `metadata.columns()`.
    aggregates: Vec<Vec<Recomputed>>,
    /// The single aggregate-only row of an empty, ungrouped result.
    synthetic: bool,
    next_row: usize,
    current: Option<usize>,
    was_null: bool,
    state: MergeState,
}

impl AggregationDistinctQueryResult {
    pub fn new(
        inputs: Vec<Box<dyn QueryResult>>,
        items: &[AggregationDistinctSelectItem],
    ) -> MergeResult<Self> {
        Self::with_group_by(inputs, items, &[], DEFAULT_AVG_DECIMAL_SCALE)
    }

    pub fn with_group_by(
        inputs: Vec<Box<dyn QueryResult>>,
        items: &[AggregationDistinctSelectItem],
        group_by: &[String],
        avg_decimal_scale: u8,
    ) -> MergeResult<Self> {
        let mut state = MergeState::Constructed;
        let representative = Arc::clone(inputs.first().ok_or(ConfigError::NoShardResults)?.metadata());
        let metadata = AggregationDistinctQueryMetaData::new(items, &representative)?;
        let group_indices = group_by
            .iter()
            .map(|label| {
                representative
                    .column_index(label)
                    .map_err(|_| ConfigError::UnknownGroupByColumn(label.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        state.advance(MergeState::Draining);
        let groups = DistinctQueryResult::from_inputs(inputs, &group_indices)?;

        let mut aggregates = Vec::with_capacity(groups.distinct_row_count());
        for group in groups.divide() {
            aggregates.push(recompute_group(&group, &metadata, avg_decimal_scale)?);
        }
        let synthetic = group_indices.is_empty() && aggregates.is_empty();
        if synthetic {
            aggregates.push(
                metadata
                    .columns()
                    .iter()
                    .map(|c| DistinctAccumulator::default().finish(c.aggregation_type, avg_decimal_scale))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        state.advance(MergeState::Ready);
        tracing::debug!(
            rows = groups.underlying_row_count(),
            groups = aggregates.len(),
            aggregations = metadata.columns().len(),
            "aggregation distinct merge ready"
        );

        Ok(Self {
            groups,
            metadata,
            aggregates,
            synthetic,
            next_row: 0,
            current: None,
            was_null: false,
            state,
        })
    }

    pub fn aggregation_metadata(&self) -> &AggregationDistinctQueryMetaData {
        &self.metadata
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Number of rows the cursor emits.
    pub fn row_count(&self) -> usize {
        self.aggregates.len()
    }

    /// The recomputed value served at `index` on the current row, or `None` when the
    /// column is read from the underlying row.
    fn recomputed(&self, index: usize) -> MergeResult<Option<Datum>> {
        let row = self.current.ok_or(ColumnError::NoCurrentRow)?;
        let aggregates = self.aggregates.get(row).ok_or(ColumnError::NoCurrentRow)?;
        let lookup = |position: Option<usize>| position.and_then(|p| aggregates.get(p));

        if let Some(a) = lookup(self.metadata.position_of_index(index)) {
            return Ok(Some(a.value.clone()));
        }
        if let Some(a) = lookup(self.metadata.position_of_derived_count(index)) {
            return Ok(Some(Datum::Int64(a.count)));
        }
        if let Some(a) = lookup(self.metadata.position_of_derived_sum(index)) {
            return Ok(Some(a.sum.clone()));
        }
        if self.synthetic {
            self.groups.metadata().column(index)?;
            return Ok(Some(Datum::Null));
        }
        Ok(None)
    }
}

/// Deduplicate each aggregation's distinct column within one group and fold the values.
fn recompute_group(
    group: &DistinctQueryResult,
    metadata: &AggregationDistinctQueryMetaData,
    avg_decimal_scale: u8,
) -> MergeResult<Vec<Recomputed>> {
    let group_key = group.key_indices().to_vec();
    let mut recomputed = Vec::with_capacity(metadata.columns().len());
    for column in metadata.columns() {
        let mut key = group_key.clone();
        key.push(column.distinct_index);
        let mut accumulator = DistinctAccumulator::default();
        for distinct_value in group.regroup_by_indices(&key).divide() {
            let value = distinct_value
                .distinct_rows()
                .next()
                .and_then(|row| row.get(column.distinct_index - 1))
                .unwrap_or(&Datum::Null);
            tracing::trace!(
                column = column.label.as_str(),
                value = %value,
                duplicates = distinct_value.underlying_row_count(),
                "distinct value"
            );
            accumulator.accept(value, column.aggregation_type)?;
        }
        recomputed.push(accumulator.finish(column.aggregation_type, avg_decimal_scale)?);
    }
    Ok(recomputed)
}

impl QueryResult for AggregationDistinctQueryResult {
    fn next(&mut self) -> MergeResult<bool> {
        if !self.synthetic {
            self.groups.next()?;
        }
        if self.next_row < self.aggregates.len() {
            self.current = Some(self.next_row);
            self.next_row += 1;
            self.state.advance(MergeState::Iterating);
            Ok(true)
        } else {
            self.current = None;
            self.state.advance(MergeState::Exhausted);
            Ok(false)
        }
    }

    fn get_value(&mut self, index: usize, target: TargetType) -> MergeResult<Datum> {
        self.was_null = false;
        match self.recomputed(index)? {
            Some(raw) => {
                let (value, was_null) = codec::read_value(&raw, target)?;
                self.was_null = was_null;
                Ok(value)
            }
            None => {
                let value = self.groups.get_value(index, target)?;
                self.was_null = self.groups.was_null();
                Ok(value)
            }
        }
    }

    fn get_calendar_value(
        &mut self,
        index: usize,
        target: TargetType,
        calendar: &FixedOffset,
    ) -> MergeResult<Datum> {
        self.was_null = false;
        match self.recomputed(index)? {
            Some(raw) => {
                let (value, was_null) = codec::read_calendar_value(&raw, target, calendar)?;
                self.was_null = was_null;
                Ok(value)
            }
            None => {
                let value = self.groups.get_calendar_value(index, target, calendar)?;
                self.was_null = self.groups.was_null();
                Ok(value)
            }
        }
    }

    fn get_input_stream(&mut self, index: usize, kind: StreamKind) -> MergeResult<InputStream> {
        self.was_null = false;
        match self.recomputed(index)? {
            Some(raw) => {
                let (stream, was_null) = codec::read_stream(&raw, kind)?;
                self.was_null = was_null;
                Ok(stream)
            }
            None => {
                let stream = self.groups.get_input_stream(index, kind)?;
                self.was_null = self.groups.was_null();
                Ok(stream)
            }
        }
    }

    fn was_null(&self) -> bool {
        self.was_null
    }

    fn metadata(&self) -> &Arc<QueryResultMetaData> {
        self.groups.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{ColumnDescriptor, RowSetCursor};
    use crate::memory::MemoryQueryResult;
    use shard_common::datum::RawCell;
    use shard_common::types::{ShardId, SqlType};

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("user_id", SqlType::BigInt),
            ColumnDescriptor::new("order_id", SqlType::BigInt),
            ColumnDescriptor::new("amount", SqlType::Decimal),
            ColumnDescriptor::new("c", SqlType::BigInt),
            ColumnDescriptor::new("s", SqlType::Decimal),
        ]
    }

    fn shard(id: u64, rows: &[(i64, i64, Option<&str>)]) -> Box<dyn QueryResult> {
        let mut cursor = RowSetCursor::new(
            columns(),
            rows.iter()
                .map(|(user, order, amount)| {
                    vec![
                        Some(RawCell::Int(*user)),
                        Some(RawCell::Int(*order)),
                        amount.map(|a| RawCell::Text(a.to_string())),
                        Some(RawCell::Int(1)),
                        amount.map(|a| RawCell::Text(a.to_string())),
                    ]
                })
                .collect(),
        );
        Box::new(MemoryQueryResult::new(ShardId(id), &mut cursor).unwrap())
    }

    fn items() -> Vec<AggregationDistinctSelectItem> {
        vec![
            AggregationDistinctSelectItem::new(AggregationType::Count, "c", "order_id"),
            AggregationDistinctSelectItem::new(AggregationType::Sum, "s", "amount"),
        ]
    }

    #[test]
    fn test_recomputes_over_union() {
        let inputs = vec![
            shard(0, &[(1, 10, Some("1.50")), (1, 11, Some("2.00"))]),
            shard(1, &[(2, 11, Some("2.0")), (2, 12, None)]),
        ];
        let mut result = AggregationDistinctQueryResult::new(inputs, &items()).unwrap();
        assert_eq!(result.row_count(), 1);
        assert!(result.next().unwrap());
        assert_eq!(result.get_value(4, TargetType::Native).unwrap(), Datum::Int64(3));
        assert_eq!(
            result.get_value(5, TargetType::Native).unwrap(),
            Datum::Decimal(350, 2)
        );
        assert!(!result.was_null());
        // Non-aggregation columns come from the first row.
        assert_eq!(result.get_value(1, TargetType::Int64).unwrap(), Datum::Int64(1));
        assert!(!result.next().unwrap());
        assert_eq!(result.state(), MergeState::Exhausted);
    }

    #[test]
    fn test_group_by() {
        let inputs = vec![
            shard(0, &[(1, 10, Some("1")), (2, 10, Some("1"))]),
            shard(1, &[(1, 10, Some("1")), (1, 11, Some("5"))]),
        ];
        let mut result = AggregationDistinctQueryResult::with_group_by(
            inputs,
            &items(),
            &["user_id".to_string()],
            DEFAULT_AVG_DECIMAL_SCALE,
        )
        .unwrap();
        let mut rows = Vec::new();
        while result.next().unwrap() {
            rows.push((
                result.get_value(1, TargetType::Int64).unwrap(),
                result.get_value(4, TargetType::Int64).unwrap(),
            ));
        }
        assert_eq!(
            rows,
            vec![
                (Datum::Int64(1), Datum::Int64(2)),
                (Datum::Int64(2), Datum::Int64(1)),
            ]
        );
    }

    #[test]
    fn test_empty_without_group_by_yields_one_row() {
        let mut result =
            AggregationDistinctQueryResult::new(vec![shard(0, &[]), shard(1, &[])], &items())
                .unwrap();
        assert!(result.next().unwrap());
        assert_eq!(result.get_value(4, TargetType::Native).unwrap(), Datum::Int64(0));
        assert!(!result.was_null());
        assert_eq!(result.get_value(5, TargetType::Native).unwrap(), Datum::Null);
        assert!(result.was_null());
        assert_eq!(result.get_value(1, TargetType::Int64).unwrap(), Datum::Int64(0));
        assert!(result.was_null());
        assert!(result.get_value(6, TargetType::Native).is_err());
        assert!(!result.next().unwrap());
    }

    #[test]
    fn test_empty_with_group_by_yields_nothing() {
        let mut result = AggregationDistinctQueryResult::with_group_by(
            vec![shard(0, &[])],
            &items(),
            &["user_id".to_string()],
            DEFAULT_AVG_DECIMAL_SCALE,
        )
        .unwrap();
        assert!(!result.next().unwrap());
    }

    #[test]
    fn test_max_min() {
        let items = vec![
            AggregationDistinctSelectItem::new(AggregationType::Max, "c", "amount"),
            AggregationDistinctSelectItem::new(AggregationType::Min, "s", "amount"),
        ];
        let inputs = vec![
            shard(0, &[(1, 10, Some("3.5")), (1, 11, None)]),
            shard(1, &[(1, 12, Some("12")), (1, 13, Some("-1"))]),
        ];
        let mut result = AggregationDistinctQueryResult::new(inputs, &items).unwrap();
        assert!(result.next().unwrap());
        assert_eq!(result.get_value(4, TargetType::Native).unwrap(), Datum::Decimal(12, 0));
        assert_eq!(result.get_value(5, TargetType::Native).unwrap(), Datum::Decimal(-1, 0));
    }

    #[test]
    fn test_decimal_average_uses_scale() {
        assert_eq!(average(&Datum::Decimal(100, 0), 3, 4), Ok(Datum::Decimal(333_333, 4)));
        assert_eq!(average(&Datum::Decimal(3000, 2), 2, 2), Ok(Datum::Decimal(1500, 2)));
        assert_eq!(average(&Datum::Int64(30), 2, 4), Ok(Datum::Float64(15.0)));
        assert_eq!(average(&Datum::Null, 0, 4), Ok(Datum::Null));
    }

    #[test]
    fn test_decimal_average_never_changes_type() {
        // Rescaling the sum to the result scale overflows; the column must not turn float.
        let widest: i128 = "9".repeat(38).parse().unwrap();
        assert!(matches!(
            average(&Datum::Decimal(widest, 0), 2, 4),
            Err(CodecError::ValueOutOfRange { target: "decimal", .. })
        ));
    }

    #[test]
    fn test_unknown_group_by_column() {
        let err = AggregationDistinctQueryResult::with_group_by(
            vec![shard(0, &[])],
            &items(),
            &["region".to_string()],
            DEFAULT_AVG_DECIMAL_SCALE,
        )
        .err()
        .unwrap();
        assert!(err.is_configuration());
    }
}
