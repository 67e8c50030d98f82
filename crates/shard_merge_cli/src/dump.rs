//! JSON shard dumps: one file per shard, replayed through a `RowSetCursor`.
//!
//! ```json
//! {"columns": [{"label": "order_id", "type": "BIGINT"},
//!              {"label": "status", "type": "VARCHAR", "table": "t_order", "case_sensitive": true}],
//!  "rows": [[1, "paid"], [2, null]]}
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use shard_common::{RawCell, ShardId, SqlType};
use shard_merge::{ColumnDescriptor, RowSetCursor, ShardSource};

#[derive(Debug, Deserialize)]
pub struct ShardDump {
    pub columns: Vec<DumpColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct DumpColumn {
    pub label: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl DumpColumn {
    fn descriptor(&self) -> ColumnDescriptor {
        let sql_type: SqlType = match self.sql_type.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        };
        let mut descriptor =
            ColumnDescriptor::new(self.label.as_str(), sql_type).case_sensitive(self.case_sensitive);
        if let Some(name) = &self.name {
            descriptor = descriptor.with_name(name.as_str());
        }
        if let Some(table) = &self.table {
            descriptor = descriptor.with_table(table.as_str());
        }
        descriptor
    }
}

impl ShardDump {
    pub fn parse(content: &str) -> Result<Self> {
        let dump: ShardDump = serde_json::from_str(content).context("malformed shard dump")?;
        for (n, row) in dump.rows.iter().enumerate() {
            if row.len() != dump.columns.len() {
                bail!(
                    "row {} has {} values, expected {}",
                    n + 1,
                    row.len(),
                    dump.columns.len()
                );
            }
        }
        Ok(dump)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn into_source(self, shard_id: ShardId) -> Result<ShardSource> {
        let columns = self.columns.iter().map(DumpColumn::descriptor).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(raw_cell).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Ok(ShardSource::new(
            shard_id,
            Box::new(RowSetCursor::new(columns, rows)),
        ))
    }
}

/// JSON scalars map onto driver cells; temporal and decimal values travel as strings and
/// are parsed against the declared column type.
fn raw_cell(value: Value) -> Result<Option<RawCell>> {
    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(RawCell::Bool(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(RawCell::Int(i)),
            None => match n.as_f64() {
                Some(f) => Some(RawCell::Float(f)),
                None => bail!("number {n} is not representable"),
            },
        },
        Value::String(s) => Some(RawCell::Text(s)),
        Value::Array(_) | Value::Object(_) => bail!("nested JSON values are not cells: {value}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_common::{Datum, TargetType};
    use shard_merge::{MemoryQueryResult, QueryResult};

    const DUMP: &str = r#"{
        "columns": [
            {"label": "order_id", "type": "BIGINT", "table": "t_order"},
            {"label": "amount", "type": "DECIMAL"},
            {"label": "status", "type": "varchar", "name": "order_status", "case_sensitive": true}
        ],
        "rows": [[1, "12.50", "paid"], [2, null, null]]
    }"#;

    #[test]
    fn test_dump_to_cursor() {
        let source = ShardDump::parse(DUMP).unwrap().into_source(ShardId(2)).unwrap();
        let mut result = MemoryQueryResult::from_cursor(source.shard_id, source.cursor).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.column_name(3).unwrap(), "order_status");
        assert!(result.is_case_sensitive(3).unwrap());

        assert!(result.next().unwrap());
        assert_eq!(
            result.get_value(2, TargetType::Decimal).unwrap(),
            Datum::Decimal(1250, 2)
        );
        assert!(result.next().unwrap());
        result.get_value(3, TargetType::Text).unwrap();
        assert!(result.was_null());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = ShardDump::parse(r#"{"columns": [{"label": "a", "type": "INT"}], "rows": [[1, 2]]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_nested_values_rejected() {
        let dump =
            ShardDump::parse(r#"{"columns": [{"label": "a", "type": "INT"}], "rows": [[[1]]]}"#)
                .unwrap();
        assert!(dump.into_source(ShardId(0)).is_err());
    }

    #[test]
    fn test_json_scalars() {
        assert_eq!(raw_cell(Value::Null).unwrap(), None);
        assert_eq!(raw_cell(serde_json::json!(3)).unwrap(), Some(RawCell::Int(3)));
        assert_eq!(raw_cell(serde_json::json!(2.5)).unwrap(), Some(RawCell::Float(2.5)));
        assert_eq!(raw_cell(serde_json::json!(true)).unwrap(), Some(RawCell::Bool(true)));
    }
}
