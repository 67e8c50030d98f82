//! Eagerly drained, replayable shard result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::FixedOffset;

use shard_common::datum::{Datum, OwnedRow};
use shard_common::error::{ColumnError, MergeError, MergeResult};
use shard_common::types::{ShardId, StreamKind, TargetType};

use crate::codec::{self, InputStream, ValueCodec};
use crate::cursor::ShardCursor;
use crate::metadata::QueryResultMetaData;
use crate::query_result::{cell_at, QueryResult};

/// An ordered, replayable sequence of rows. Cloning shares the rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultData {
    rows: Arc<[OwnedRow]>,
}

impl ResultData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&OwnedRow> {
        self.rows.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OwnedRow> {
        self.rows.iter()
    }
}

impl From<Vec<OwnedRow>> for ResultData {
    fn from(rows: Vec<OwnedRow>) -> Self {
        Self { rows: rows.into() }
    }
}

/// Rows every shard of one merge may buffer between them; a limit of 0 is unbounded.
///
/// Shared by concurrent drains, so a shard stops at the row that crosses the limit rather
/// than after the whole merge has been buffered.
#[derive(Debug, Default)]
pub struct RowBudget {
    limit: usize,
    used: AtomicUsize,
}

impl RowBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Account for one more buffered row.
    pub fn claim_row(&self) -> MergeResult<()> {
        let rows = self.used.fetch_add(1, Ordering::Relaxed) + 1;
        if self.limit > 0 && rows > self.limit {
            return Err(MergeError::RowLimitExceeded {
                rows,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }
}

/// Serves reads from rows drained out of a shard cursor at construction.
///
/// The cursor is not needed once construction returns.
#[derive(Debug, Clone)]
pub struct MemoryQueryResult {
    shard_id: ShardId,
    metadata: Arc<QueryResultMetaData>,
    data: ResultData,
    /// Position of the next row `next` will move to.
    next_position: usize,
    current: Option<usize>,
    was_null: bool,
}

impl MemoryQueryResult {
    /// Drain `cursor` to the end. A driver failure part-way fails the whole construction.
    pub fn new(shard_id: ShardId, cursor: &mut dyn ShardCursor) -> MergeResult<Self> {
        Self::drain_within(shard_id, cursor, &RowBudget::unlimited())
    }

    /// Drain `cursor`, charging every row to `budget`.
    pub fn drain_within(
        shard_id: ShardId,
        cursor: &mut dyn ShardCursor,
        budget: &RowBudget,
    ) -> MergeResult<Self> {
        let metadata = Arc::new(QueryResultMetaData::from_descriptors(cursor.columns()));
        let mut rows = Vec::new();
        while cursor
            .advance()
            .map_err(|e| MergeError::shard(shard_id, e))?
        {
            budget.claim_row()?;
            let mut values = Vec::with_capacity(metadata.column_count());
            for column in metadata.columns() {
                let cell = cursor
                    .read(column.index())
                    .map_err(|e| MergeError::shard(shard_id, e))?;
                values.push(ValueCodec::decode(cell, column.sql_type())?);
            }
            rows.push(OwnedRow::new(values));
        }
        tracing::debug!(shard = %shard_id, rows = rows.len(), "shard drained");
        Ok(Self::from_data(shard_id, metadata, ResultData::from(rows)))
    }

    /// Drain `cursor`, then close it whether or not the drain succeeded.
    pub fn from_cursor(shard_id: ShardId, cursor: Box<dyn ShardCursor>) -> MergeResult<Self> {
        Self::from_cursor_within(shard_id, cursor, &RowBudget::unlimited())
    }

    pub fn from_cursor_within(
        shard_id: ShardId,
        mut cursor: Box<dyn ShardCursor>,
        budget: &RowBudget,
    ) -> MergeResult<Self> {
        let drained = Self::drain_within(shard_id, cursor.as_mut(), budget);
        let closed = cursor.close();
        let result = drained?;
        closed.map_err(|e| MergeError::shard(shard_id, e))?;
        Ok(result)
    }

    pub fn from_data(
        shard_id: ShardId,
        metadata: Arc<QueryResultMetaData>,
        data: ResultData,
    ) -> Self {
        Self {
            shard_id,
            metadata,
            data,
            next_position: 0,
            current: None,
            was_null: false,
        }
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &ResultData {
        &self.data
    }

    /// A fresh cursor over the same rows, positioned before the first row.
    pub fn replay(&self) -> Self {
        Self::from_data(self.shard_id, Arc::clone(&self.metadata), self.data.clone())
    }

    fn current_cell(&mut self, index: usize) -> MergeResult<&Datum> {
        self.was_null = false;
        let position = self.current.ok_or(ColumnError::NoCurrentRow)?;
        let row = self
            .data
            .get(position)
            .ok_or(ColumnError::NoCurrentRow)?;
        Ok(cell_at(row, &self.metadata, index)?)
    }
}

impl QueryResult for MemoryQueryResult {
    fn next(&mut self) -> MergeResult<bool> {
        if self.next_position < self.data.len() {
            self.current = Some(self.next_position);
            self.next_position += 1;
            Ok(true)
        } else {
            self.current = None;
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
        &self.metadata
    }
}
