use std::fmt;
use std::str::FromStr;

use shard_common::error::ConfigError;

/// Alias prefix of the COUNT column a rewritten `AVG(DISTINCT x)` adds to shard SQL.
pub const DERIVED_COUNT_ALIAS_PREFIX: &str = "AVG_DERIVED_COUNT_";
/// Alias prefix of the SUM column a rewritten `AVG(DISTINCT x)` adds to shard SQL.
pub const DERIVED_SUM_ALIAS_PREFIX: &str = "AVG_DERIVED_SUM_";

pub fn derived_count_alias(derived_index: usize) -> String {
    format!("{DERIVED_COUNT_ALIAS_PREFIX}{derived_index}")
}

pub fn derived_sum_alias(derived_index: usize) -> String {
    format!("{DERIVED_SUM_ALIAS_PREFIX}{derived_index}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationType {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationType::Count => "COUNT",
            AggregationType::Sum => "SUM",
            AggregationType::Avg => "AVG",
            AggregationType::Max => "MAX",
            AggregationType::Min => "MIN",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COUNT" => Ok(AggregationType::Count),
            "SUM" => Ok(AggregationType::Sum),
            "AVG" => Ok(AggregationType::Avg),
            "MAX" => Ok(AggregationType::Max),
            "MIN" => Ok(AggregationType::Min),
            other => Err(ConfigError::Invalid(format!("unknown aggregation type: {other}"))),
        }
    }
}

/// One projected aggregation column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSelectItem {
    pub aggregation_type: AggregationType,
    pub column_label: String,
}

impl AggregationSelectItem {
    pub fn new(aggregation_type: AggregationType, column_label: impl Into<String>) -> Self {
        Self {
            aggregation_type,
            column_label: column_label.into(),
        }
    }
}

/// A `DISTINCT`-qualified aggregation column and the column carrying its distinct values.
///
/// For AVG, `derived_items` holds the COUNT and SUM companions the rewriter added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationDistinctSelectItem {
    pub item: AggregationSelectItem,
    pub distinct_column_label: String,
    pub derived_items: Vec<AggregationSelectItem>,
}

impl AggregationDistinctSelectItem {
    pub fn new(
        aggregation_type: AggregationType,
        column_label: impl Into<String>,
        distinct_column_label: impl Into<String>,
    ) -> Self {
        Self {
            item: AggregationSelectItem::new(aggregation_type, column_label),
            distinct_column_label: distinct_column_label.into(),
            derived_items: Vec::new(),
        }
    }

    /// `AVG(DISTINCT ..)` with its `AVG_DERIVED_COUNT_n` / `AVG_DERIVED_SUM_n` companions.
    pub fn avg(
        column_label: impl Into<String>,
        distinct_column_label: impl Into<String>,
        derived_index: usize,
    ) -> Self {
        Self::new(AggregationType::Avg, column_label, distinct_column_label).with_derived_items(vec![
            AggregationSelectItem::new(AggregationType::Count, derived_count_alias(derived_index)),
            AggregationSelectItem::new(AggregationType::Sum, derived_sum_alias(derived_index)),
        ])
    }

    pub fn with_derived_items(mut self, derived_items: Vec<AggregationSelectItem>) -> Self {
        self.derived_items = derived_items;
        self
    }

    pub fn aggregation_type(&self) -> AggregationType {
        self.item.aggregation_type
    }

    pub fn column_label(&self) -> &str {
        &self.item.column_label
    }
}
