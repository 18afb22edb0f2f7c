//! Checks against a BigQuery table, issued as Standard SQL through a
//! [`QueryRunner`].
//!
//! Every query returns exactly one row. Metadata queries aggregate over
//! `INFORMATION_SCHEMA` so that a missing table or column still yields a row.

use super::runner::{BqCommandRunner, QueryRunner, RemoteConfig};
use super::{messages, prepare_regex, round2, CheckBackend, IqrBounds};
use crate::core::{format_number, CheckOutcome, Operator, RegexType};
use crate::logging::{truncate_field, MAX_LOGGED_QUERY_LEN};
use crate::prelude::*;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

const NO_DATA: &str = "__no_data__";
const BAD_OUTPUT: &str = "Could not convert bq command output";

const NUMERIC_TYPES: &[&str] = &["INT64", "NUMERIC", "BIGNUMERIC", "FLOAT64"];
const DATETIME_TYPES: &[&str] = &["DATE", "DATETIME", "TIMESTAMP"];

/// Evaluates checks by sending BigQuery SQL to a [`QueryRunner`].
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    dataset: String,
    table: String,
    runner: Arc<dyn QueryRunner>,
}

impl RemoteBackend {
    /// Creates a backend for `dataset.table`.
    ///
    /// Both names are validated here, so every later query can splice them in.
    pub fn new(
        dataset: impl Into<String>,
        table: impl Into<String>,
        runner: Arc<dyn QueryRunner>,
    ) -> Result<Self> {
        let dataset = dataset.into();
        let table = table.into();
        SqlSecurity::validate_table_name(&dataset)?;
        SqlSecurity::validate_table_name(&table)?;
        Ok(Self {
            dataset,
            table,
            runner,
        })
    }

    /// Creates a backend that shells out to the `bq` client.
    pub fn with_bq_cli(
        dataset: impl Into<String>,
        table: impl Into<String>,
        config: RemoteConfig,
    ) -> Result<Self> {
        Self::new(dataset, table, Arc::new(BqCommandRunner::new(config)))
    }

    /// Dataset holding the table.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Table being checked.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn table_ref(&self) -> Result<String> {
        Ok(format!(
            "{}.{}",
            SqlSecurity::escape_bigquery_identifier(&self.dataset)?,
            SqlSecurity::escape_bigquery_identifier(&self.table)?
        ))
    }

    fn schema_view(&self, view: &str) -> Result<String> {
        Ok(format!(
            "{}.INFORMATION_SCHEMA.{view}",
            SqlSecurity::escape_bigquery_identifier(&self.dataset)?
        ))
    }

    /// Runs `sql` and returns the first row of the JSON result.
    async fn query_row(&self, sql: &str) -> Result<Map<String, Value>> {
        debug!(
            query = %truncate_field(sql, MAX_LOGGED_QUERY_LEN),
            "Executing remote check query"
        );
        let output = self.runner.run(sql).await?;
        parse_first_row(&output)
    }

    async fn query_number(&self, sql: &str) -> Result<Option<f64>> {
        let row = self.query_row(sql).await?;
        row_number(&row, "number")
    }

    async fn query_count(&self, sql: &str) -> Result<f64> {
        Ok(self.query_number(sql).await?.unwrap_or(0.0))
    }

    async fn query_bool(&self, sql: &str) -> Result<bool> {
        let row = self.query_row(sql).await?;
        match row.get("bool") {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => Ok(s.eq_ignore_ascii_case("true")),
            _ => Err(bad_output()),
        }
    }

    async fn query_string(&self, sql: &str) -> Result<String> {
        let row = self.query_row(sql).await?;
        match row.get("string") {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(bad_output()),
        }
    }

    /// The column's BigQuery `data_type`, or `None` when the column is missing.
    async fn column_type(&self, column: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT IFNULL(ANY_VALUE(data_type), \"{NO_DATA}\") AS string FROM {} \
             WHERE table_name = '{}' AND column_name = '{}'",
            self.schema_view("COLUMNS")?,
            SqlSecurity::escape_string_literal(&self.table),
            SqlSecurity::escape_string_literal(column)
        );
        let data_type = self.query_string(&sql).await?;
        Ok((data_type != NO_DATA).then_some(data_type))
    }

    async fn check_type_family(
        &self,
        column: &str,
        family: &[&str],
        wanted: &str,
    ) -> Result<CheckOutcome> {
        let data_type = self.column_type(column).await?;
        let actual = data_type.as_deref().unwrap_or(NO_DATA);
        Ok(CheckOutcome::from_predicate(
            in_family(actual, family),
            || format!("column {column} want {wanted} type, got {actual}"),
        ))
    }
}

fn bad_output() -> WhistleError {
    WhistleError::query("bigquery", BAD_OUTPUT)
}

/// Extracts the first row object from `bq --format=json` output.
pub(crate) fn parse_first_row(output: &str) -> Result<Map<String, Value>> {
    let parsed: Value = serde_json::from_str(output.trim()).map_err(|_| bad_output())?;
    match parsed {
        Value::Array(rows) => match rows.into_iter().next() {
            Some(Value::Object(row)) => Ok(row),
            _ => Err(bad_output()),
        },
        _ => Err(bad_output()),
    }
}

/// Reads a numeric field. `bq` renders numbers as JSON strings; nulls come
/// back as JSON null.
pub(crate) fn row_number(row: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match row.get(key) {
        Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(bad_output),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| bad_output()),
        _ => Err(bad_output()),
    }
}

/// Matches a `data_type` such as `NUMERIC(10, 2)` against base type names.
fn in_family(data_type: &str, family: &[&str]) -> bool {
    let base = data_type.split('(').next().unwrap_or(data_type).trim();
    family.contains(&base)
}

/// Renders an `f64` as a BigQuery FLOAT64 expression.
fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "CAST('nan' AS FLOAT64)".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("CAST('{sign}inf' AS FLOAT64)")
    } else {
        format!("{value:?}")
    }
}

#[async_trait]
impl CheckBackend for RemoteBackend {
    fn description(&self) -> String {
        format!("bigquery table {}.{}", self.dataset, self.table)
    }

    #[instrument(skip(self), fields(dataset = %self.dataset, table = %self.table))]
    async fn check_table_exists(&self) -> Result<CheckOutcome> {
        let sql = format!(
            "SELECT IF(COUNT(*) > 0, \"True\", \"False\") AS bool FROM {} WHERE table_name = '{}'",
            self.schema_view("TABLES")?,
            SqlSecurity::escape_string_literal(&self.table)
        );
        let exists = self.query_bool(&sql).await?;
        Ok(CheckOutcome::from_predicate(exists, || {
            format!("table {} not found in dataset {}", self.table, self.dataset)
        }))
    }

    #[instrument(skip(self))]
    async fn check_row_count(&self, count: i64, operator: &Operator) -> Result<CheckOutcome> {
        if !operator.is_recognized() {
            return Ok(CheckOutcome::fail(messages::row_count_operator(operator)));
        }
        let sql = format!("SELECT COUNT(*) AS number FROM {}", self.table_ref()?);
        let rows = self.query_count(&sql).await?;
        let passed = operator.compare(rows, count as f64).unwrap_or(false);
        Ok(CheckOutcome::from_predicate(passed, || {
            messages::row_count(operator, count, rows)
        }))
    }

    #[instrument(skip(self))]
    async fn check_no_duplicate_rows(&self) -> Result<CheckOutcome> {
        let sql = format!(
            "SELECT COUNT(*) - COUNT(DISTINCT TO_JSON_STRING(t)) AS number FROM {} AS t",
            self.table_ref()?
        );
        let duplicates = self.query_count(&sql).await?;
        Ok(CheckOutcome::from_predicate(duplicates == 0.0, || {
            messages::duplicate_rows(duplicates)
        }))
    }

    async fn check_column_exists(&self, column: &str) -> Result<CheckOutcome> {
        let sql = format!(
            "SELECT IF(COUNT(*) > 0, \"True\", \"False\") AS bool FROM {} \
             WHERE table_name = '{}' AND column_name = '{}'",
            self.schema_view("COLUMNS")?,
            SqlSecurity::escape_string_literal(&self.table),
            SqlSecurity::escape_string_literal(column)
        );
        let exists = self.query_bool(&sql).await?;
        Ok(CheckOutcome::from_predicate(exists, || {
            format!("column {column} not found in table {}", self.table)
        }))
    }

    async fn check_is_numeric(&self, column: &str) -> Result<CheckOutcome> {
        self.check_type_family(column, NUMERIC_TYPES, "numeric").await
    }

    async fn check_is_string(&self, column: &str) -> Result<CheckOutcome> {
        self.check_type_family(column, &["STRING"], "string").await
    }

    #[instrument(skip(self))]
    async fn check_is_datetime(&self, column: &str, format: Option<&str>) -> Result<CheckOutcome> {
        let data_type = self.column_type(column).await?;
        let actual = data_type.as_deref().unwrap_or(NO_DATA);
        if in_family(actual, DATETIME_TYPES) {
            return Ok(CheckOutcome::pass());
        }
        if !in_family(actual, &["STRING"]) {
            return Ok(CheckOutcome::fail(format!(
                "column {column} want datetime type, got {actual}"
            )));
        }

        let col = SqlSecurity::escape_bigquery_identifier(column)?;
        let unparsed = match format {
            Some(format) => format!(
                "SAFE.PARSE_DATETIME('{}', TRIM({col})) IS NULL",
                SqlSecurity::escape_string_literal(format)
            ),
            None => format!(
                "SAFE_CAST(TRIM({col}) AS TIMESTAMP) IS NULL AND SAFE_CAST(TRIM({col}) AS DATE) IS NULL"
            ),
        };
        let sql = format!(
            "SELECT COUNTIF({col} IS NOT NULL AND TRIM({col}) != \"\" AND {unparsed}) AS number FROM {}",
            self.table_ref()?
        );
        let failures = self.query_count(&sql).await?;
        if failures == 0.0 {
            return Ok(CheckOutcome::pass());
        }
        Ok(match format {
            Some(format) => CheckOutcome::fail(messages::datetime_format(column, format)),
            None => CheckOutcome::fail(messages::not_datetime(column)),
        })
    }

    async fn check_no_blanks(&self, column: &str) -> Result<CheckOutcome> {
        let sql = format!(
            "SELECT COUNTIF(TRIM({}) = \"\") AS number FROM {}",
            SqlSecurity::escape_bigquery_identifier(column)?,
            self.table_ref()?
        );
        let blanks = self.query_count(&sql).await?;
        Ok(CheckOutcome::from_predicate(blanks == 0.0, || {
            messages::blanks(column)
        }))
    }

    async fn check_no_duplicates(&self, column: &str) -> Result<CheckOutcome> {
        let col = SqlSecurity::escape_bigquery_identifier(column)?;
        let sql = format!(
            "SELECT COUNT(*) - COUNT(DISTINCT {col}) - IF(COUNTIF({col} IS NULL) > 0, 1, 0) \
             AS number FROM {}",
            self.table_ref()?
        );
        let duplicates = self.query_count(&sql).await?;
        Ok(CheckOutcome::from_predicate(duplicates == 0.0, || {
            messages::no_duplicates(column, duplicates)
        }))
    }

    async fn check_no_nulls(&self, column: &str) -> Result<CheckOutcome> {
        let sql = format!(
            "SELECT COUNTIF({} IS NULL) AS number FROM {}",
            SqlSecurity::escape_bigquery_identifier(column)?,
            self.table_ref()?
        );
        let nulls = self.query_count(&sql).await?;
        Ok(CheckOutcome::from_predicate(nulls == 0.0, || {
            messages::no_nulls(column, nulls)
        }))
    }

    #[instrument(skip(self))]
    async fn check_no_outliers(&self, column: &str) -> Result<CheckOutcome> {
        let col = SqlSecurity::escape_bigquery_identifier(column)?;
        let sql = format!(
            "SELECT APPROX_QUANTILES({col}, 4)[SAFE_OFFSET(1)] AS q1, \
             APPROX_QUANTILES({col}, 4)[SAFE_OFFSET(3)] AS q3, \
             MIN({col}) AS min, MAX({col}) AS max FROM {}",
            self.table_ref()?
        );
        let row = self.query_row(&sql).await?;
        let (q1, q3) = (row_number(&row, "q1")?, row_number(&row, "q3")?);
        let (min, max) = (row_number(&row, "min")?, row_number(&row, "max")?);

        let (Some(q1), Some(q3), Some(min), Some(max)) = (q1, q3, min, max) else {
            return Ok(CheckOutcome::pass());
        };
        let bounds = IqrBounds::from_quartiles(q1, q3);
        if max > bounds.upper {
            return Ok(CheckOutcome::fail(format!(
                "column {column} outlier above 1.5xIQR {}: {}",
                format_number(round2(bounds.upper)),
                format_number(max)
            )));
        }
        if min < bounds.lower {
            return Ok(CheckOutcome::fail(format!(
                "column {column} outlier below 1.5xIQR {}: {}",
                format_number(round2(bounds.lower)),
                format_number(min)
            )));
        }
        Ok(CheckOutcome::pass())
    }

    async fn check_count_distinct(
        &self,
        column: &str,
        count: i64,
        operator: &Operator,
    ) -> Result<CheckOutcome> {
        if !operator.is_recognized() {
            return Ok(CheckOutcome::fail(messages::count_distinct_operator(
                column, operator,
            )));
        }
        let sql = format!(
            "SELECT COUNT(DISTINCT {}) AS number FROM {}",
            SqlSecurity::escape_bigquery_identifier(column)?,
            self.table_ref()?
        );
        let distinct = self.query_count(&sql).await?;
        let passed = operator.compare(distinct, count as f64).unwrap_or(false);
        Ok(CheckOutcome::from_predicate(passed, || {
            messages::count_distinct(column, operator, count, distinct)
        }))
    }

    async fn check_value(
        &self,
        column: &str,
        value: f64,
        operator: &Operator,
    ) -> Result<CheckOutcome> {
        let col = SqlSecurity::escape_bigquery_identifier(column)?;
        let table = self.table_ref()?;
        match operator {
            Operator::Unrecognized(_) => {
                Ok(CheckOutcome::fail(messages::value_operator(column, operator)))
            }
            Operator::Equal => {
                let sql = format!(
                    "SELECT COUNTIF({col} IS NULL OR {col} != {}) AS number FROM {table}",
                    float_literal(value)
                );
                let mismatches = self.query_count(&sql).await?;
                Ok(CheckOutcome::from_predicate(mismatches == 0.0, || {
                    format!(
                        "column {column} want all values = {}, got {} different values",
                        format_number(value),
                        format_number(mismatches)
                    )
                }))
            }
            Operator::AtLeast | Operator::AtMost => {
                let aggregate = if *operator == Operator::AtLeast {
                    "MIN"
                } else {
                    "MAX"
                };
                let sql = format!("SELECT {aggregate}({col}) AS number FROM {table}");
                match self.query_number(&sql).await? {
                    Some(actual) => Ok(CheckOutcome::from_predicate(
                        operator.compare(actual, value).unwrap_or(false),
                        || messages::value(column, operator, value, actual),
                    )),
                    None => Ok(CheckOutcome::fail(messages::value_all_null(
                        column, operator, value,
                    ))),
                }
            }
        }
    }

    async fn check_regex(
        &self,
        column: &str,
        rule: Option<&str>,
        regex_type: Option<RegexType>,
    ) -> Result<CheckOutcome> {
        let (pattern, regex_type) = match prepare_regex(column, rule, regex_type) {
            Ok(prepared) => prepared,
            Err(outcome) => return Ok(outcome),
        };
        let rule = pattern.as_str();
        let col = SqlSecurity::escape_bigquery_identifier(column)?;
        let (default, wanted) = match regex_type {
            RegexType::Mandatory => (1, 1.0),
            RegexType::Exclude => (0, 0.0),
        };
        let sql = format!(
            "SELECT IFNULL(AVG(IF(REGEXP_CONTAINS({col}, '{}'), 1, 0)), {default}) AS number \
             FROM {} WHERE {col} IS NOT NULL",
            SqlSecurity::validate_regex_pattern(rule)?,
            self.table_ref()?
        );
        let fraction = self.query_count(&sql).await?;
        Ok(CheckOutcome::from_predicate(fraction == wanted, || {
            match regex_type {
                RegexType::Mandatory => format!(
                    "column {column} found a non matching regex record with rule {rule}"
                ),
                RegexType::Exclude => {
                    format!("column {column} found invalid regex matches with rule {rule}")
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outputs and records every query.
    #[derive(Debug, Default)]
    struct Scripted {
        outputs: Mutex<VecDeque<String>>,
        queries: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outputs: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs.iter().map(|s| s.to_string()).collect()),
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl QueryRunner for Scripted {
        async fn run(&self, sql: &str) -> Result<String> {
            self.queries.lock().unwrap().push(sql.to_string());
            Ok(self.outputs.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn backend(runner: Arc<Scripted>) -> RemoteBackend {
        RemoteBackend::new("sales", "orders", runner).unwrap()
    }

    #[test]
    fn test_parse_first_row() {
        let row = parse_first_row("[{\"number\":\"12\"}]").unwrap();
        assert_eq!(row_number(&row, "number").unwrap(), Some(12.0));

        let row = parse_first_row("[{\"number\":null}]").unwrap();
        assert_eq!(row_number(&row, "number").unwrap(), None);

        assert!(parse_first_row("[]").is_err());
        assert!(parse_first_row("not json").is_err());
        let row = parse_first_row("[{\"string\":\"x\"}]").unwrap();
        assert!(row_number(&row, "number").is_err());
    }

    #[test]
    fn test_type_families() {
        assert!(in_family("NUMERIC(10, 2)", NUMERIC_TYPES));
        assert!(in_family("INT64", NUMERIC_TYPES));
        assert!(!in_family("STRING", NUMERIC_TYPES));
        assert!(in_family("TIMESTAMP", DATETIME_TYPES));
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(float_literal(4.0), "4.0");
        assert_eq!(float_literal(-0.5), "-0.5");
        assert_eq!(float_literal(f64::INFINITY), "CAST('inf' AS FLOAT64)");
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let runner = Scripted::new(&[]);
        assert!(RemoteBackend::new("sales", "orders'; --", runner).is_err());
    }

    #[tokio::test]
    async fn test_table_exists() {
        let runner = Scripted::new(&["[{\"bool\":\"False\"}]"]);
        let outcome = backend(runner.clone()).check_table_exists().await.unwrap();
        assert_eq!(outcome.message, "table orders not found in dataset sales");
        let queries = runner.queries.lock().unwrap();
        assert!(queries[0].contains("`sales`.INFORMATION_SCHEMA.TABLES"));
        assert!(queries[0].contains("table_name = 'orders'"));
    }

    #[tokio::test]
    async fn test_row_count() {
        let runner = Scripted::new(&["[{\"number\":\"5\"}]"]);
        let outcome = backend(runner.clone())
            .check_row_count(3, &Operator::AtMost)
            .await
            .unwrap();
        assert_eq!(outcome.message, "want row count <= 3, got 5");
        assert_eq!(
            runner.queries.lock().unwrap()[0],
            "SELECT COUNT(*) AS number FROM `sales`.`orders`"
        );
    }

    #[tokio::test]
    async fn test_bad_output_is_an_error() {
        let runner = Scripted::new(&["[{\"count\":\"5\"}]"]);
        let err = backend(runner)
            .check_row_count(3, &Operator::AtMost)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query error (bigquery): Could not convert bq command output"
        );
    }

    #[tokio::test]
    async fn test_type_checks() {
        let runner = Scripted::new(&[
            "[{\"string\":\"STRING\"}]",
            "[{\"string\":\"__no_data__\"}]",
        ]);
        let b = backend(runner);
        assert_eq!(
            b.check_is_numeric("price").await.unwrap().message,
            "column price want numeric type, got STRING"
        );
        assert!(!b.check_is_string("price").await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_datetime_on_string_column() {
        let runner = Scripted::new(&["[{\"string\":\"STRING\"}]", "[{\"number\":\"2\"}]"]);
        let outcome = backend(runner.clone())
            .check_is_datetime("day", Some("%Y-%m-%d"))
            .await
            .unwrap();
        assert_eq!(
            outcome.message,
            "column day data does not match datetime format %Y-%m-%d"
        );
        assert!(runner.queries.lock().unwrap()[1].contains("SAFE.PARSE_DATETIME('%Y-%m-%d'"));
    }

    #[tokio::test]
    async fn test_outliers() {
        let runner = Scripted::new(&[
            "[{\"q1\":\"2\",\"q3\":\"4\",\"min\":\"1\",\"max\":\"100\"}]",
            "[{\"q1\":\"2\",\"q3\":\"4\",\"min\":\"-5\",\"max\":\"4\"}]",
            "[{\"q1\":null,\"q3\":null,\"min\":null,\"max\":null}]",
        ]);
        let b = backend(runner);
        assert_eq!(
            b.check_no_outliers("x").await.unwrap().message,
            "column x outlier above 1.5xIQR 7: 100"
        );
        assert_eq!(
            b.check_no_outliers("x").await.unwrap().message,
            "column x outlier below 1.5xIQR -1: -5"
        );
        assert!(b.check_no_outliers("x").await.unwrap().passed);
    }

    #[tokio::test]
    async fn test_value_checks() {
        let runner = Scripted::new(&["[{\"number\":\"2\"}]", "[{\"number\":\"7\"}]"]);
        let b = backend(runner.clone());
        let equal = b.check_value("x", 4.0, &Operator::Equal).await.unwrap();
        assert_eq!(
            equal.message,
            "column x want all values = 4, got 2 different values"
        );
        let max = b.check_value("x", 5.0, &Operator::AtMost).await.unwrap();
        assert_eq!(max.message, "column x want value <= 5, got 7");

        let bad = b
            .check_value("x", 5.0, &Operator::parse("<"))
            .await
            .unwrap();
        assert_eq!(bad.message, "column x value check operator < not recognised");
        assert_eq!(runner.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_regex_fraction() {
        let runner = Scripted::new(&["[{\"number\":\"0.5\"}]", "[{\"number\":\"0\"}]"]);
        let b = backend(runner.clone());
        let mandatory = b
            .check_regex("code", Some("^A"), Some(RegexType::Mandatory))
            .await
            .unwrap();
        assert!(!mandatory.passed);
        let exclude = b
            .check_regex("code", Some("it's"), Some(RegexType::Exclude))
            .await
            .unwrap();
        assert!(exclude.passed);
        assert!(runner.queries.lock().unwrap()[1].contains("'it\\'s'"));

        let invalid = b
            .check_regex("code", Some("("), Some(RegexType::Exclude))
            .await
            .unwrap();
        assert_eq!(invalid.message, "column code invalid regex_rule (");
        assert_eq!(runner.queries.lock().unwrap().len(), 2);
    }
}
