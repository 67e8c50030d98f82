//! Physical shard cursors: the driver-level interface the result layer consumes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use shard_common::datum::RawCell;
use shard_common::error::DriverError;
use shard_common::types::SqlType;

/// A shard driver's description of one physical result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub label: String,
    pub name: String,
    pub table: String,
    pub case_sensitive: bool,
    pub sql_type: SqlType,
}

impl ColumnDescriptor {
    /// A column whose name equals its label, with no owning table.
    pub fn new(label: impl Into<String>, sql_type: SqlType) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            label,
            table: String::new(),
            case_sensitive: false,
            sql_type,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

/// One live result cursor on one shard.
///
/// Column indices are 1-based. `read` is only meaningful after `advance` returned
/// `true`; `Ok(None)` is a SQL NULL.
pub trait ShardCursor: Send {
    fn columns(&self) -> &[ColumnDescriptor];

    /// Move to the next physical row. May block on network I/O.
    fn advance(&mut self) -> Result<bool, DriverError>;

    fn read(&mut self, index: usize) -> Result<Option<RawCell>, DriverError>;

    /// Release the underlying statement/connection. Idempotent.
    fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// A `ShardCursor` over rows already in memory.
///
/// Backs shard dumps in the CLI and every test; `failing_after` injects a driver
/// failure part-way through the rows.
pub struct RowSetCursor {
    columns: Vec<ColumnDescriptor>,
    rows: std::vec::IntoIter<Vec<Option<RawCell>>>,
    current: Option<Vec<Option<RawCell>>>,
    fail_after: Option<usize>,
    advanced: usize,
    closed: Arc<AtomicBool>,
}

impl RowSetCursor {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<Option<RawCell>>>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
            current: None,
            fail_after: None,
            advanced: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the `rows + 1`-th `advance` fail with a connection-reset I/O error.
    pub fn failing_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }

    /// Observe whether the cursor has been closed after it has been moved away.
    pub fn close_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl ShardCursor for RowSetCursor {
    fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn advance(&mut self) -> Result<bool, DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed);
        }
        if self.fail_after == Some(self.advanced) {
            self.current = None;
            return Err(DriverError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("injected failure after {} rows", self.advanced),
            )));
        }
        self.current = self.rows.next();
        if self.current.is_some() {
            self.advanced += 1;
        }
        Ok(self.current.is_some())
    }

    fn read(&mut self, index: usize) -> Result<Option<RawCell>, DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed);
        }
        let row = self.current.as_ref().ok_or(DriverError::BadColumn(index))?;
        index
            .checked_sub(1)
            .and_then(|i| row.get(i))
            .cloned()
            .ok_or(DriverError::BadColumn(index))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> RowSetCursor {
        RowSetCursor::new(
            vec![ColumnDescriptor::new("id", SqlType::Integer)],
            vec![vec![Some(RawCell::Int(1))], vec![None]],
        )
    }

    #[test]
    fn test_walks_rows_then_exhausts() {
        let mut c = cursor();
        assert!(c.advance().unwrap());
        assert_eq!(c.read(1).unwrap(), Some(RawCell::Int(1)));
        assert!(c.advance().unwrap());
        assert_eq!(c.read(1).unwrap(), None);
        assert!(!c.advance().unwrap());
    }

    #[test]
    fn test_bad_column_index() {
        let mut c = cursor();
        c.advance().unwrap();
        assert!(matches!(c.read(0), Err(DriverError::BadColumn(0))));
        assert!(matches!(c.read(2), Err(DriverError::BadColumn(2))));
    }

    #[test]
    fn test_injected_failure() {
        let mut c = cursor().failing_after(1);
        assert!(c.advance().unwrap());
        assert!(matches!(c.advance(), Err(DriverError::Io(_))));
    }

    #[test]
    fn test_close_is_observable() {
        let mut c = cursor();
        let closed = c.close_handle();
        c.close().unwrap();
        assert!(closed.load(Ordering::Acquire));
        assert!(matches!(c.advance(), Err(DriverError::Closed)));
    }
}
