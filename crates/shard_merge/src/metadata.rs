//! Column metadata of a shard result.

use std::collections::HashMap;

use shard_common::error::ColumnError;
use shard_common::types::SqlType;

use crate::cursor::ColumnDescriptor;

/// One result column. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetaData {
    index: usize,
    label: String,
    name: String,
    owning_table: String,
    case_sensitive: bool,
    sql_type: SqlType,
}

impl ColumnMetaData {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owning_table(&self) -> &str {
        &self.owning_table
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn sql_type(&self) -> &SqlType {
        &self.sql_type
    }
}

/// Column metadata of one result, with a label index.
///
/// Label lookup tries the exact spelling first, then an ASCII case-insensitive match.
/// When several columns share a label, the last one registered wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResultMetaData {
    columns: Vec<ColumnMetaData>,
    exact_labels: HashMap<String, usize>,
    folded_labels: HashMap<String, usize>,
}

impl QueryResultMetaData {
    pub fn from_descriptors(descriptors: &[ColumnDescriptor]) -> Self {
        let mut columns = Vec::with_capacity(descriptors.len());
        let mut exact_labels = HashMap::with_capacity(descriptors.len());
        let mut folded_labels = HashMap::with_capacity(descriptors.len());
        for (offset, d) in descriptors.iter().enumerate() {
            let index = offset + 1;
            exact_labels.insert(d.label.clone(), index);
            folded_labels.insert(d.label.to_ascii_lowercase(), index);
            columns.push(ColumnMetaData {
                index,
                label: d.label.clone(),
                name: d.name.clone(),
                owning_table: d.table.clone(),
                case_sensitive: d.case_sensitive,
                sql_type: d.sql_type.clone(),
            });
        }
        Self {
            columns,
            exact_labels,
            folded_labels,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnMetaData] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Result<&ColumnMetaData, ColumnError> {
        index
            .checked_sub(1)
            .and_then(|offset| self.columns.get(offset))
            .ok_or(ColumnError::UnknownColumnIndex {
                index,
                column_count: self.columns.len(),
            })
    }

    pub fn column_label(&self, index: usize) -> Result<&str, ColumnError> {
        self.column(index).map(ColumnMetaData::label)
    }

    pub fn column_name(&self, index: usize) -> Result<&str, ColumnError> {
        self.column(index).map(ColumnMetaData::name)
    }

    pub fn owning_table(&self, index: usize) -> Result<&str, ColumnError> {
        self.column(index).map(ColumnMetaData::owning_table)
    }

    pub fn is_case_sensitive(&self, index: usize) -> Result<bool, ColumnError> {
        self.column(index).map(ColumnMetaData::is_case_sensitive)
    }

    pub fn sql_type(&self, index: usize) -> Result<&SqlType, ColumnError> {
        self.column(index).map(ColumnMetaData::sql_type)
    }

    /// Resolve a label to its 1-based column index.
    pub fn column_index(&self, label: &str) -> Result<usize, ColumnError> {
        self.exact_labels
            .get(label)
            .or_else(|| self.folded_labels.get(&label.to_ascii_lowercase()))
            .copied()
            .ok_or_else(|| ColumnError::UnknownColumnLabel(label.to_string()))
    }
}
