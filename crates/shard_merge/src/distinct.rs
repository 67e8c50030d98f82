//! Global deduplication over the union of all shard rows.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::FixedOffset;

use shard_common::datum::{Datum, OwnedRow};
use shard_common::error::{ColumnError, ConfigError, MergeResult};
use shard_common::types::{StreamKind, TargetType};

use crate::codec::{self, InputStream};
use crate::gather::{encode_distinct_key, KeyColumn};
use crate::metadata::QueryResultMetaData;
use crate::query_result::{cell_at, read_row, QueryResult};
use crate::MergeState;

/// A buffered row and the input it came from.
#[derive(Debug, Clone)]
struct SourcedRow {
    row: OwnedRow,
    source: usize,
}

/// Emits each distinct combination of the key columns once, in first-seen order.
///
/// Construction drains every input. All rows are kept, grouped by key: the first row of a
/// group is what the cursor emits, the rest are what `divide` hands back.
#[derive(Debug, Clone)]
pub struct DistinctQueryResult {
    /// Metadata of each input, by input position.
    sources: Arc<[Arc<QueryResultMetaData>]>,
    representative: Arc<QueryResultMetaData>,
    /// Every drained row in input order, shared by divided results.
    rows: Arc<[SourcedRow]>,
    /// 1-based key column indices.
    key_indices: Vec<usize>,
    /// Positions into `rows`, ascending; the first is the emitted row.
    groups: Vec<Arc<[usize]>>,
    next_group: usize,
    current: Option<usize>,
    was_null: bool,
    state: MergeState,
}

impl DistinctQueryResult {
    /// Deduplicate `inputs` on `distinct_labels`; an empty label list keys on whole rows.
    ///
    /// Labels are resolved against the first input's metadata before anything is drained.
    pub fn new(inputs: Vec<Box<dyn QueryResult>>, distinct_labels: &[String]) -> MergeResult<Self> {
        let first = inputs.first().ok_or(ConfigError::NoShardResults)?;
        let metadata = Arc::clone(first.metadata());
        let key_indices = if distinct_labels.is_empty() {
            (1..=metadata.column_count()).collect()
        } else {
            distinct_labels
                .iter()
                .map(|label| metadata.column_index(label))
                .collect::<Result<Vec<_>, _>>()?
        };
        Self::from_inputs(inputs, &key_indices)
    }

    /// Drain `inputs` and group on 1-based `key_indices`. No indices puts every row in one
    /// group.
    pub(crate) fn from_inputs(
        inputs: Vec<Box<dyn QueryResult>>,
        key_indices: &[usize],
    ) -> MergeResult<Self> {
        let mut state = MergeState::Constructed;
        state.advance(MergeState::Draining);
        let input_count = inputs.len();
        let mut sources = Vec::with_capacity(input_count);
        let mut rows = Vec::new();
        for (source, mut input) in inputs.into_iter().enumerate() {
            sources.push(Arc::clone(input.metadata()));
            while input.next()? {
                rows.push(SourcedRow {
                    row: read_row(input.as_mut())?,
                    source,
                });
            }
        }
        let representative = sources
            .first()
            .cloned()
            .ok_or(ConfigError::NoShardResults)?;
        warn_on_mixed_case_sensitivity(&sources, &representative, key_indices);

        let mut result = Self::group(sources.into(), representative, rows.into(), None, key_indices);
        state.advance(MergeState::Ready);
        result.state = state;
        tracing::debug!(
            inputs = input_count,
            rows = result.rows.len(),
            distinct = result.groups.len(),
            "distinct merge ready"
        );
        Ok(result)
    }

    /// Group the rows at `positions` (all rows when `None`) on `key_indices`.
    fn group(
        sources: Arc<[Arc<QueryResultMetaData>]>,
        representative: Arc<QueryResultMetaData>,
        rows: Arc<[SourcedRow]>,
        positions: Option<Vec<usize>>,
        key_indices: &[usize],
    ) -> Self {
        let key: Vec<KeyColumn> = key_indices
            .iter()
            .map(|&index| KeyColumn {
                offset: index - 1,
                case_insensitive: !representative.is_case_sensitive(index).unwrap_or(true),
            })
            .collect();
        let positions = positions.unwrap_or_else(|| (0..rows.len()).collect());

        let mut lookup: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for position in positions {
            let Some(sourced) = rows.get(position) else {
                continue;
            };
            match lookup.entry(encode_distinct_key(&key, &sourced.row.values)) {
                Entry::Vacant(e) => {
                    e.insert(groups.len());
                    groups.push(vec![position]);
                }
                Entry::Occupied(e) => groups[*e.get()].push(position),
            }
        }

        Self {
            sources,
            representative,
            rows,
            key_indices: key_indices.to_vec(),
            groups: groups.into_iter().map(Arc::<[usize]>::from).collect(),
            next_group: 0,
            current: None,
            was_null: false,
            state: MergeState::Ready,
        }
    }

    /// One result per distinct key, each holding every pre-dedup row with that key.
    pub fn divide(&self) -> Vec<DistinctQueryResult> {
        self.groups
            .iter()
            .map(|group| Self {
                sources: Arc::clone(&self.sources),
                representative: Arc::clone(&self.representative),
                rows: Arc::clone(&self.rows),
                key_indices: self.key_indices.clone(),
                groups: vec![Arc::clone(group)],
                next_group: 0,
                current: None,
                was_null: false,
                state: MergeState::Ready,
            })
            .collect()
    }

    /// Deduplicate this result's underlying rows again, on different columns.
    pub fn regroup(&self, distinct_labels: &[String]) -> MergeResult<DistinctQueryResult> {
        let key_indices = distinct_labels
            .iter()
            .map(|label| self.representative.column_index(label))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.regroup_by_indices(&key_indices))
    }

    pub(crate) fn regroup_by_indices(&self, key_indices: &[usize]) -> DistinctQueryResult {
        let mut positions: Vec<usize> = self.groups.iter().flat_map(|g| g.iter().copied()).collect();
        positions.sort_unstable();
        Self::group(
            Arc::clone(&self.sources),
            Arc::clone(&self.representative),
            Arc::clone(&self.rows),
            Some(positions),
            key_indices,
        )
    }

    /// Number of rows the cursor emits.
    pub fn distinct_row_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of pre-dedup rows behind the emitted ones.
    pub fn underlying_row_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    pub fn key_indices(&self) -> &[usize] {
        &self.key_indices
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    /// The emitted row of each group, in emission order.
    pub fn distinct_rows(&self) -> impl Iterator<Item = &OwnedRow> + '_ {
        self.groups
            .iter()
            .filter_map(|g| g.first().and_then(|&p| self.rows.get(p)))
            .map(|sourced| &sourced.row)
    }

    /// Every pre-dedup row, grouped, in emission order.
    pub fn underlying_rows(&self) -> impl Iterator<Item = &OwnedRow> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.iter())
            .filter_map(|&p| self.rows.get(p))
            .map(|sourced| &sourced.row)
    }

    fn current_row(&self) -> Option<&SourcedRow> {
        let group = self.groups.get(self.current?)?;
        self.rows.get(*group.first()?)
    }

    fn metadata_for(&self, source: usize) -> &Arc<QueryResultMetaData> {
        self.sources.get(source).unwrap_or(&self.representative)
    }

    fn current_cell(&mut self, index: usize) -> MergeResult<&Datum> {
        self.was_null = false;
        let sourced = self.current_row().ok_or(ColumnError::NoCurrentRow)?;
        Ok(cell_at(&sourced.row, self.metadata_for(sourced.source), index)?)
    }
}

fn warn_on_mixed_case_sensitivity(
    sources: &[Arc<QueryResultMetaData>],
    representative: &QueryResultMetaData,
    key_indices: &[usize],
) {
    for &index in key_indices {
        let Ok(expected) = representative.is_case_sensitive(index) else {
            continue;
        };
        if sources
            .iter()
            .any(|m| m.is_case_sensitive(index).map_or(false, |flag| flag != expected))
        {
            tracing::warn!(
                column = representative.column_label(index).unwrap_or_default(),
                case_sensitive = expected,
                "shards disagree on column case sensitivity, keying with the first shard's flag"
            );
        }
    }
}

impl QueryResult for DistinctQueryResult {
    fn next(&mut self) -> MergeResult<bool> {
        if self.next_group < self.groups.len() {
            self.current = Some(self.next_group);
            self.next_group += 1;
            self.state.advance(MergeState::Iterating);
            Ok(true)
        } else {
            self.current = None;
            self.state.advance(MergeState::Exhausted);
            Ok(false)
        }
    }

    fn get_value(&mut self, index: usize, target: TargetType) -> MergeResult<Datum> {
        let (value, was_null) = codec::read_value(self.current_cell(index)?, target)?;
        self.was_null = was_null;
        Ok(value)
    }

    fn get_calendar_value(
        &mut self,
        index: usize,
        target: TargetType,
        calendar: &FixedOffset,
    ) -> MergeResult<Datum> {
        let (value, was_null) =
            codec::read_calendar_value(self.current_cell(index)?, target, calendar)?;
        self.was_null = was_null;
        Ok(value)
    }

    fn get_input_stream(&mut self, index: usize, kind: StreamKind) -> MergeResult<InputStream> {
        let (stream, was_null) = codec::read_stream(self.current_cell(index)?, kind)?;
        self.was_null = was_null;
        Ok(stream)
    }

    fn was_null(&self) -> bool {
        self.was_null
    }

    fn metadata(&self) -> &Arc<QueryResultMetaData> {
        match self.current_row() {
            Some(sourced) => self.metadata_for(sourced.source),
            None => &self.representative,
        }
    }
}
