//! Check function libraries, one per kind of data source.
//!
//! Suites never touch data directly. They hold an `Arc<dyn CheckBackend>` and
//! call one capability method per rule. Every method returns a
//! [`CheckOutcome`]: a rule that finds bad data is a failing outcome, and only
//! infrastructure faults (a query that cannot run, a result that cannot be read)
//! are returned as errors.
//!
//! Two implementations exist:
//!
//! - [`InMemoryBackend`] evaluates checks against a table registered in a
//!   DataFusion `SessionContext`.
//! - [`RemoteBackend`] issues BigQuery Standard SQL through a [`QueryRunner`]
//!   and reads single-row JSON results.
//!
//! Verdicts can differ between them at the edges of the regex and outlier
//! checks (exact against approximate quartiles, per-value matches against a
//! match fraction). Message wording differs too.

use crate::core::{CheckOutcome, Operator, RegexType};
use crate::prelude::*;
use async_trait::async_trait;
use std::fmt::Debug;

mod memory;
mod remote;
mod runner;

pub use memory::{InMemoryBackend, DEFAULT_TABLE_NAME};
pub use remote::RemoteBackend;
pub use runner::{BqCommandRunner, QueryRunner, RemoteConfig};

/// Multiplier applied to the inter-quartile range to find outlier bounds.
pub const IQR_FENCE: f64 = 1.5;

/// The capability set every data source implements.
///
/// Column methods may assume the column exists: suites always run
/// [`check_column_exists`](CheckBackend::check_column_exists) first and skip the
/// column when it fails.
#[async_trait]
pub trait CheckBackend: Debug + Send + Sync {
    /// Human-readable description of the data source, used in logs.
    fn description(&self) -> String;

    /// Verifies that the table being checked exists.
    ///
    /// Backends constructed from an already-loaded table pass unconditionally.
    async fn check_table_exists(&self) -> Result<CheckOutcome> {
        Ok(CheckOutcome::pass())
    }

    /// Compares the table's row count against `count`.
    async fn check_row_count(&self, count: i64, operator: &Operator) -> Result<CheckOutcome>;

    /// Fails when any row is an exact duplicate of an earlier row.
    async fn check_no_duplicate_rows(&self) -> Result<CheckOutcome>;

    /// Fails when the column is missing from the table.
    async fn check_column_exists(&self, column: &str) -> Result<CheckOutcome>;

    /// Fails unless the column has a numeric storage type.
    async fn check_is_numeric(&self, column: &str) -> Result<CheckOutcome>;

    /// Fails unless the column has a string storage type.
    async fn check_is_string(&self, column: &str) -> Result<CheckOutcome>;

    /// Fails unless every non-null value parses as a date or timestamp,
    /// using `format` when one is given.
    async fn check_is_datetime(&self, column: &str, format: Option<&str>) -> Result<CheckOutcome>;

    /// Fails when the column holds empty or whitespace-only strings.
    async fn check_no_blanks(&self, column: &str) -> Result<CheckOutcome>;

    /// Fails when any value repeats an earlier value (nulls count as a value).
    async fn check_no_duplicates(&self, column: &str) -> Result<CheckOutcome>;

    /// Fails when the column holds nulls.
    async fn check_no_nulls(&self, column: &str) -> Result<CheckOutcome>;

    /// Fails when any value lies outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
    async fn check_no_outliers(&self, column: &str) -> Result<CheckOutcome>;

    /// Compares the number of distinct non-null values against `count`.
    async fn check_count_distinct(
        &self,
        column: &str,
        count: i64,
        operator: &Operator,
    ) -> Result<CheckOutcome>;

    /// `>=` compares the column minimum, `<=` the column maximum and `==`
    /// requires every row to equal `value`.
    async fn check_value(&self, column: &str, value: f64, operator: &Operator)
        -> Result<CheckOutcome>;

    /// Applies a regex rule to the column's non-null values.
    async fn check_regex(
        &self,
        column: &str,
        rule: Option<&str>,
        regex_type: Option<RegexType>,
    ) -> Result<CheckOutcome>;
}

/// Outlier bounds derived from the first and third quartiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    /// Values below this are outliers
    pub lower: f64,
    /// Values above this are outliers
    pub upper: f64,
}

impl IqrBounds {
    /// Builds the 1.5 IQR fence around `q1` and `q3`.
    pub fn from_quartiles(q1: f64, q3: f64) -> Self {
        let iqr = q3 - q1;
        Self {
            lower: q1 - IQR_FENCE * iqr,
            upper: q3 + IQR_FENCE * iqr,
        }
    }

    /// Returns true if `value` lies strictly outside the bounds.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// Rounds a bound to two decimals for display.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Shared failure messages, so both backends word the common cases alike.
pub(crate) mod messages {
    use crate::core::{format_number, Operator};

    pub fn row_count_operator(operator: &Operator) -> String {
        format!("table row count operator {operator} not recognised")
    }

    pub fn row_count(operator: &Operator, count: i64, actual: f64) -> String {
        format!(
            "want row count {operator} {count}, got {}",
            format_number(actual)
        )
    }

    pub fn duplicate_rows(duplicates: f64) -> String {
        format!("want 0 duplicate rows, got {}", format_number(duplicates))
    }

    pub fn count_distinct_operator(column: &str, operator: &Operator) -> String {
        format!("column {column} count distinct operator {operator} not recognised")
    }

    pub fn count_distinct(column: &str, operator: &Operator, count: i64, actual: f64) -> String {
        format!(
            "column {column} want count distinct {operator} {count}, got {}",
            format_number(actual)
        )
    }

    pub fn value_operator(column: &str, operator: &Operator) -> String {
        format!("column {column} value check operator {operator} not recognised")
    }

    pub fn value(column: &str, operator: &Operator, value: f64, actual: f64) -> String {
        format!(
            "column {column} want value {operator} {}, got {}",
            format_number(value),
            format_number(actual)
        )
    }

    pub fn value_all_null(column: &str, operator: &Operator, value: f64) -> String {
        format!(
            "column {column} want value {operator} {}, got only nulls",
            format_number(value)
        )
    }

    pub fn no_duplicates(column: &str, duplicates: f64) -> String {
        format!(
            "column {column} want 0 duplicate rows, got {}",
            format_number(duplicates)
        )
    }

    pub fn no_nulls(column: &str, nulls: f64) -> String {
        format!("column {column} want 0 nulls, got {}", format_number(nulls))
    }

    pub fn blanks(column: &str) -> String {
        format!("column {column} has blanks or whitespace only values")
    }

    pub fn not_numeric(column: &str) -> String {
        format!("column {column} expected to be numeric but is not")
    }

    pub fn not_string(column: &str) -> String {
        format!("column {column} expected to be string type but is not")
    }

    pub fn not_datetime(column: &str) -> String {
        format!("column {column} expected to be datetime type but is not")
    }

    pub fn datetime_format(column: &str, format: &str) -> String {
        format!("column {column} data does not match datetime format {format}")
    }

    pub fn regex_missing(column: &str) -> String {
        format!("column {column} None regex_rule or regex_type")
    }

    pub fn regex_blank(column: &str) -> String {
        format!("column {column} blank regex_rule")
    }

    pub fn regex_invalid(column: &str, rule: &str) -> String {
        format!("column {column} invalid regex_rule {rule}")
    }
}

/// Validates a regex rule before it is applied, turning every problem into a
/// failing outcome.
///
/// Returns the compiled pattern and the rule kind when the rule is usable.
pub(crate) fn prepare_regex(
    column: &str,
    rule: Option<&str>,
    regex_type: Option<RegexType>,
) -> std::result::Result<(regex::Regex, RegexType), CheckOutcome> {
    let (rule, regex_type) = match (rule, regex_type) {
        (Some(rule), Some(regex_type)) => (rule, regex_type),
        _ => return Err(CheckOutcome::fail(messages::regex_missing(column))),
    };
    if rule.is_empty() {
        return Err(CheckOutcome::fail(messages::regex_blank(column)));
    }
    if crate::security::SqlSecurity::validate_regex_pattern(rule).is_err() {
        return Err(CheckOutcome::fail(messages::regex_invalid(column, rule)));
    }
    match regex::Regex::new(rule) {
        Ok(pattern) => Ok((pattern, regex_type)),
        Err(_) => Err(CheckOutcome::fail(messages::regex_invalid(column, rule))),
    }
}
