//! The cursor capability every shard result and every merged result provides.

use std::sync::Arc;

use chrono::FixedOffset;

use shard_common::datum::{Datum, OwnedRow};
use shard_common::error::{ColumnError, MergeResult};
use shard_common::types::{StreamKind, TargetType};

use crate::codec::InputStream;
use crate::metadata::QueryResultMetaData;

/// A forward-only result cursor.
///
/// Column indices are 1-based. Every value read sets the flag returned by `was_null`,
/// so it always describes the most recent read.
pub trait QueryResult: Send {
    /// Advance to the next row. Returns `false` once exhausted.
    fn next(&mut self) -> MergeResult<bool>;

    fn get_value(&mut self, index: usize, target: TargetType) -> MergeResult<Datum>;

    /// Read a date/time column in `calendar`. Fails with an unsupported-type error when
    /// `target` is not a date/time type.
    fn get_calendar_value(
        &mut self,
        index: usize,
        target: TargetType,
        calendar: &FixedOffset,
    ) -> MergeResult<Datum>;

    fn get_input_stream(&mut self, index: usize, kind: StreamKind) -> MergeResult<InputStream>;

    fn was_null(&self) -> bool;

    /// Metadata describing the current row.
    fn metadata(&self) -> &Arc<QueryResultMetaData>;

    fn column_count(&self) -> usize {
        self.metadata().column_count()
    }

    fn column_label(&self, index: usize) -> MergeResult<&str> {
        Ok(self.metadata().column_label(index)?)
    }

    fn column_name(&self, index: usize) -> MergeResult<&str> {
        Ok(self.metadata().column_name(index)?)
    }

    fn column_index(&self, label: &str) -> MergeResult<usize> {
        Ok(self.metadata().column_index(label)?)
    }

    fn is_case_sensitive(&self, index: usize) -> MergeResult<bool> {
        Ok(self.metadata().is_case_sensitive(index)?)
    }

    fn get_value_by_label(&mut self, label: &str, target: TargetType) -> MergeResult<Datum> {
        let index = self.column_index(label)?;
        self.get_value(index, target)
    }

    fn get_calendar_value_by_label(
        &mut self,
        label: &str,
        target: TargetType,
        calendar: &FixedOffset,
    ) -> MergeResult<Datum> {
        let index = self.column_index(label)?;
        self.get_calendar_value(index, target, calendar)
    }

    fn get_input_stream_by_label(
        &mut self,
        label: &str,
        kind: StreamKind,
    ) -> MergeResult<InputStream> {
        let index = self.column_index(label)?;
        self.get_input_stream(index, kind)
    }
}

/// Capture the current row of `result` in canonical form, NULLs included.
pub fn read_row(result: &mut dyn QueryResult) -> MergeResult<OwnedRow> {
    let column_count = result.column_count();
    let mut values = Vec::with_capacity(column_count);
    for index in 1..=column_count {
        let value = result.get_value(index, TargetType::Native)?;
        values.push(if result.was_null() { Datum::Null } else { value });
    }
    Ok(OwnedRow::new(values))
}

/// The stored value at 1-based `index` of a buffered row.
pub(crate) fn cell_at<'a>(
    row: &'a OwnedRow,
    metadata: &QueryResultMetaData,
    index: usize,
) -> Result<&'a Datum, ColumnError> {
    metadata.column(index)?;
    row.get(index - 1).ok_or(ColumnError::UnknownColumnIndex {
        index,
        column_count: row.len(),
    })
}
