//! Unbuffered pass-through over one live shard cursor.

use std::sync::Arc;

use chrono::FixedOffset;

use shard_common::datum::Datum;
use shard_common::error::{ColumnError, MergeError, MergeResult};
use shard_common::types::{ShardId, StreamKind, TargetType};

use crate::codec::{self, InputStream, ValueCodec};
use crate::cursor::ShardCursor;
use crate::metadata::QueryResultMetaData;
use crate::query_result::QueryResult;

/// Forwards every call onto one shard cursor; each `next` consumes exactly one physical
/// row. Single pass. The cursor is closed when the result is dropped.
pub struct StreamQueryResult {
    shard_id: ShardId,
    cursor: Box<dyn ShardCursor>,
    metadata: Arc<QueryResultMetaData>,
    positioned: bool,
    exhausted: bool,
    closed: bool,
    was_null: bool,
}

impl StreamQueryResult {
    pub fn new(shard_id: ShardId, cursor: Box<dyn ShardCursor>) -> Self {
        let metadata = Arc::new(QueryResultMetaData::from_descriptors(cursor.columns()));
        Self {
            shard_id,
            cursor,
            metadata,
            positioned: false,
            exhausted: false,
            closed: false,
            was_null: false,
        }
    }

    pub fn shard_id(&self) -> ShardId {
        self.shard_id
    }

    /// Release the shard cursor. Further `next` calls return `false`.
    pub fn close(&mut self) -> MergeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.positioned = false;
        self.exhausted = true;
        let shard_id = self.shard_id;
        self.cursor
            .close()
            .map_err(|e| MergeError::shard(shard_id, e))
    }

    fn current_value(&mut self, index: usize) -> MergeResult<Datum> {
        self.was_null = false;
        if !self.positioned {
            return Err(ColumnError::NoCurrentRow.into());
        }
        let shard_id = self.shard_id;
        let sql_type = self.metadata.sql_type(index)?;
        let cell = self
            .cursor
            .read(index)
            .map_err(|e| MergeError::shard(shard_id, e))?;
        Ok(ValueCodec::decode(cell, sql_type)?)
    }
}

impl QueryResult for StreamQueryResult {
    fn next(&mut self) -> MergeResult<bool> {
        if self.exhausted {
            return Ok(false);
        }
        match self.cursor.advance() {
            Ok(true) => {
                self.positioned = true;
                Ok(true)
            }
            Ok(false) => {
                self.positioned = false;
                self.exhausted = true;
                tracing::debug!(shard = %self.shard_id, "stream exhausted");
                Ok(false)
            }
            Err(e) => {
                self.positioned = false;
                self.exhausted = true;
                tracing::warn!(shard = %self.shard_id, error = %e, "stream read failed");
                Err(MergeError::shard(self.shard_id, e))
            }
        }
    }

    fn get_value(&mut self, index: usize, target: TargetType) -> MergeResult<Datum> {
        let raw = self.current_value(index)?;
        let (value, was_null) = codec::read_value(&raw, target)?;
        self.was_null = was_null;
        Ok(value)
    }

    fn get_calendar_value(
        &mut self,
        index: usize,
        target: TargetType,
        calendar: &FixedOffset,
    ) -> MergeResult<Datum> {
        let raw = self.current_value(index)?;
        let (value, was_null) = codec::read_calendar_value(&raw, target, calendar)?;
        self.was_null = was_null;
        Ok(value)
    }

    fn get_input_stream(&mut self, index: usize, kind: StreamKind) -> MergeResult<InputStream> {
        let raw = self.current_value(index)?;
        let (stream, was_null) = codec::read_stream(&raw, kind)?;
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

impl Drop for StreamQueryResult {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(shard = %self.shard_id, error = %e, "failed to close shard cursor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{ColumnDescriptor, RowSetCursor};
    use shard_common::datum::RawCell;
    use shard_common::types::SqlType;
    use std::sync::atomic::Ordering;

    fn cursor() -> RowSetCursor {
        RowSetCursor::new(
            vec![
                ColumnDescriptor::new("id", SqlType::Integer),
                ColumnDescriptor::new("name", SqlType::VarChar),
            ],
            vec![
                vec![Some(RawCell::Int(1)), None],
                vec![Some(RawCell::Int(2)), Some(RawCell::Text("b".into()))],
            ],
        )
    }

    #[test]
    fn test_forwards_rows_and_tracks_null() {
        let mut result = StreamQueryResult::new(ShardId(0), Box::new(cursor()));
        assert!(result.next().unwrap());
        assert_eq!(result.get_value(1, TargetType::Int64).unwrap(), Datum::Int64(1));
        assert!(!result.was_null());
        assert_eq!(
            result.get_value(2, TargetType::Text).unwrap(),
            Datum::Text(String::new())
        );
        assert!(result.was_null());
        assert_eq!(result.get_value(1, TargetType::Native).unwrap(), Datum::Int32(1));
        assert!(!result.was_null());

        assert!(result.next().unwrap());
        assert_eq!(
            result.get_value_by_label("NAME", TargetType::Text).unwrap(),
            Datum::Text("b".into())
        );
        assert!(!result.next().unwrap());
        assert!(!result.next().unwrap());
    }

    #[test]
    fn test_read_before_next_fails() {
        let mut result = StreamQueryResult::new(ShardId(0), Box::new(cursor()));
        let err = result.get_value(1, TargetType::Native).unwrap_err();
        assert!(matches!(err, MergeError::Column(ColumnError::NoCurrentRow)));
    }

    #[test]
    fn test_driver_failure_is_attributed_to_shard() {
        let mut result =
            StreamQueryResult::new(ShardId(4), Box::new(cursor().failing_after(1)));
        assert!(result.next().unwrap());
        let err = result.next().unwrap_err();
        assert!(err.is_io());
        assert_eq!(err.shard_id(), Some(ShardId(4)));
    }

    #[test]
    fn test_drop_closes_cursor() {
        let cursor = cursor();
        let closed = cursor.close_handle();
        let mut result = StreamQueryResult::new(ShardId(0), Box::new(cursor));
        assert!(result.next().unwrap());
        drop(result);
        assert!(closed.load(Ordering::Acquire));
    }
}
