//! Plain scatter-gather: shard results concatenated in input order.

use std::sync::Arc;

use chrono::FixedOffset;

use shard_common::datum::Datum;
use shard_common::error::{ColumnError, ConfigError, MergeResult};
use shard_common::types::{StreamKind, TargetType};

use crate::codec::InputStream;
use crate::metadata::QueryResultMetaData;
use crate::query_result::QueryResult;

/// Walks each input to exhaustion, then moves on to the next.
pub struct IteratorQueryResult {
    inputs: Vec<Box<dyn QueryResult>>,
    current: usize,
    positioned: bool,
    was_null: bool,
}

impl IteratorQueryResult {
    pub fn new(inputs: Vec<Box<dyn QueryResult>>) -> MergeResult<Self> {
        if inputs.is_empty() {
            return Err(ConfigError::NoShardResults.into());
        }
        Ok(Self {
            inputs,
            current: 0,
            positioned: false,
            was_null: false,
        })
    }

    fn current_input(&mut self) -> MergeResult<&mut Box<dyn QueryResult>> {
        self.was_null = false;
        if !self.positioned {
            return Err(ColumnError::NoCurrentRow.into());
        }
        Ok(self
            .inputs
            .get_mut(self.current)
            .ok_or(ColumnError::NoCurrentRow)?)
    }
}

impl QueryResult for IteratorQueryResult {
    fn next(&mut self) -> MergeResult<bool> {
        while let Some(input) = self.inputs.get_mut(self.current) {
            if input.next()? {
                self.positioned = true;
                return Ok(true);
            }
            self.current += 1;
        }
        self.positioned = false;
        Ok(false)
    }

    fn get_value(&mut self, index: usize, target: TargetType) -> MergeResult<Datum> {
        let input = self.current_input()?;
        let value = input.get_value(index, target)?;
        let was_null = input.was_null();
        self.was_null = was_null;
        Ok(value)
    }

    fn get_calendar_value(
        &mut self,
        index: usize,
        target: TargetType,
        calendar: &FixedOffset,
    ) -> MergeResult<Datum> {
        let input = self.current_input()?;
        let value = input.get_calendar_value(index, target, calendar)?;
        let was_null = input.was_null();
        self.was_null = was_null;
        Ok(value)
    }

    fn get_input_stream(&mut self, index: usize, kind: StreamKind) -> MergeResult<InputStream> {
        let input = self.current_input()?;
        let stream = input.get_input_stream(index, kind)?;
        let was_null = input.was_null();
        self.was_null = was_null;
        Ok(stream)
    }

    fn was_null(&self) -> bool {
        self.was_null
    }

    fn metadata(&self) -> &Arc<QueryResultMetaData> {
        let last = self.inputs.len().saturating_sub(1);
        self.inputs[self.current.min(last)].metadata()
    }
}
