//! Active rules, assembled from suite configuration once per run.

use super::{ColumnType, Operator};

/// A table-level rule.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRule {
    /// No row may duplicate another
    NoDuplicateRows,
    /// Row count `<=` the bound
    RowCountMax(i64),
    /// Row count `>=` the bound
    RowCountMin(i64),
    /// Row count `==` the bound
    RowCount(i64),
}

impl TableRule {
    /// Short name used in logs and progress events.
    pub fn name(&self) -> &'static str {
        match self {
            TableRule::NoDuplicateRows => "no_duplicate_rows",
            TableRule::RowCountMax(_) => "row_count_max",
            TableRule::RowCountMin(_) => "row_count_min",
            TableRule::RowCount(_) => "row_count",
        }
    }

    /// Builds the active table rules in execution order.
    pub fn assemble(
        allow_duplicate_rows: bool,
        row_count_max: Option<i64>,
        row_count_min: Option<i64>,
        row_count: Option<i64>,
    ) -> Vec<TableRule> {
        let mut rules = Vec::new();
        if !allow_duplicate_rows {
            rules.push(TableRule::NoDuplicateRows);
        }
        rules.extend(row_count_max.map(TableRule::RowCountMax));
        rules.extend(row_count_min.map(TableRule::RowCountMin));
        rules.extend(row_count.map(TableRule::RowCount));
        rules
    }

    /// Returns the bound and operator for the row count variants.
    pub fn row_count_bound(&self) -> Option<(i64, Operator)> {
        match self {
            TableRule::NoDuplicateRows => None,
            TableRule::RowCountMax(n) => Some((*n, Operator::AtMost)),
            TableRule::RowCountMin(n) => Some((*n, Operator::AtLeast)),
            TableRule::RowCount(n) => Some((*n, Operator::Equal)),
        }
    }
}

/// A column-level rule. The column existence check is not a rule: it always
/// runs first and is handled by the suite.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRule {
    /// The declared type, with the optional date format for datetime columns
    Type {
        /// Declared type
        column_type: ColumnType,
        /// strftime-style format for datetime columns
        date_format: Option<String>,
    },
    /// No empty or whitespace-only values
    NoBlanks,
    /// No repeated values
    NoDuplicates,
    /// No nulls
    NoNulls,
    /// No values outside the 1.5 IQR fence
    NoOutliers,
    /// Distinct count `<=` the bound
    CountDistinctMax(i64),
    /// Distinct count `>=` the bound
    CountDistinctMin(i64),
    /// Distinct count `==` the bound
    CountDistinct(i64),
    /// Column minimum `>=` the value
    MinValue(f64),
    /// Column maximum `<=` the value
    MaxValue(f64),
    /// Every value `==` the value
    Value(f64),
    /// Regex rule
    Regex,
}

impl ColumnRule {
    /// Short name used in logs and progress events.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnRule::Type { .. } => "type",
            ColumnRule::NoBlanks => "no_blanks",
            ColumnRule::NoDuplicates => "no_duplicates",
            ColumnRule::NoNulls => "no_nulls",
            ColumnRule::NoOutliers => "no_outliers",
            ColumnRule::CountDistinctMax(_) => "count_distinct_max",
            ColumnRule::CountDistinctMin(_) => "count_distinct_min",
            ColumnRule::CountDistinct(_) => "count_distinct",
            ColumnRule::MinValue(_) => "min",
            ColumnRule::MaxValue(_) => "max",
            ColumnRule::Value(_) => "val",
            ColumnRule::Regex => "regex",
        }
    }
}
