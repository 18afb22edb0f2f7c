//! Checks against a table registered in a DataFusion `SessionContext`.

use super::{messages, prepare_regex, round2, CheckBackend, IqrBounds};
use crate::core::{format_number, CheckOutcome, Operator, RegexType};
use crate::logging::{truncate_field, MAX_LOGGED_QUERY_LEN};
use crate::prelude::*;
use crate::security::SqlSecurity;
use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampNanosecondArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default name of the registered table.
pub const DEFAULT_TABLE_NAME: &str = "data";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%b %d %Y", "%Y%m%d"];

/// Evaluates checks with DataFusion SQL over a registered table, plus local
/// statistics for percentiles, blanks and regex matching.
///
/// A successful datetime type check replaces the table registration with one
/// in which the column holds timestamps, so later checks in the same run see
/// the converted values.
#[derive(Clone)]
pub struct InMemoryBackend {
    ctx: SessionContext,
    table_name: String,
}

impl fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl InMemoryBackend {
    /// Creates a backend over the table registered as `data`.
    pub fn new(ctx: SessionContext) -> Self {
        Self::with_table_name(ctx, DEFAULT_TABLE_NAME)
    }

    /// Creates a backend over a table registered under another name.
    pub fn with_table_name(ctx: SessionContext, table_name: impl Into<String>) -> Self {
        Self {
            ctx,
            table_name: table_name.into(),
        }
    }

    /// Registers `batches` as the `data` table of a fresh session.
    pub fn from_batches(schema: Arc<Schema>, batches: Vec<RecordBatch>) -> Result<Self> {
        let ctx = SessionContext::new();
        let table = MemTable::try_new(schema, vec![batches])?;
        ctx.register_table(DEFAULT_TABLE_NAME, Arc::new(table))?;
        Ok(Self::new(ctx))
    }

    /// The session holding the table.
    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    /// Name of the table being checked.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn table_identifier(&self) -> Result<String> {
        SqlSecurity::escape_identifier(&self.table_name)
    }

    async fn field(&self, column: &str) -> Result<Option<Field>> {
        let df = self.ctx.table(self.table_name.as_str()).await?;
        Ok(df
            .schema()
            .inner()
            .column_with_name(column)
            .map(|(_, field)| field.clone()))
    }

    async fn require_field(&self, column: &str) -> Result<Field> {
        self.field(column).await?.ok_or_else(|| {
            WhistleError::check_evaluation(column, format!("column {column} not found in data"))
        })
    }

    /// Runs `sql` and returns every value of the first row as `f64`, with
    /// `None` for nulls.
    async fn query_row(&self, sql: &str) -> Result<Vec<Option<f64>>> {
        debug!(
            query = %truncate_field(sql, MAX_LOGGED_QUERY_LEN),
            "Executing in-memory check query"
        );
        let batches = self.ctx.sql(sql).await?.collect().await?;
        let batch = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| WhistleError::Internal(format!("Query returned no rows: {sql}")))?;

        let mut row = Vec::with_capacity(batch.num_columns());
        for column in batch.columns() {
            let values = cast(column, &DataType::Float64)?;
            let values = values
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| WhistleError::Internal("Failed to read aggregate".to_string()))?;
            row.push(if values.is_null(0) {
                None
            } else {
                Some(values.value(0))
            });
        }
        Ok(row)
    }

    async fn query_count(&self, sql: &str) -> Result<f64> {
        let row = self.query_row(sql).await?;
        Ok(row.first().copied().flatten().unwrap_or(0.0))
    }

    /// Collects one column of the table as arrays, one per batch.
    async fn column_arrays(&self, column: &str) -> Result<Vec<ArrayRef>> {
        let sql = format!(
            "SELECT {} FROM {}",
            SqlSecurity::escape_identifier(column)?,
            self.table_identifier()?
        );
        let batches = self.ctx.sql(&sql).await?.collect().await?;
        Ok(batches.iter().map(|b| Arc::clone(b.column(0))).collect())
    }

    async fn string_values(&self, column: &str) -> Result<Vec<Option<String>>> {
        let mut values = Vec::new();
        for array in self.column_arrays(column).await? {
            let strings = cast(&array, &DataType::Utf8)?;
            let strings = strings
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| WhistleError::Internal("Failed to read string column".to_string()))?;
            values.extend(strings.iter().map(|v| v.map(str::to_string)));
        }
        Ok(values)
    }

    async fn numeric_values(&self, column: &str) -> Result<Vec<f64>> {
        let mut values = Vec::new();
        for array in self.column_arrays(column).await? {
            let numbers = cast(&array, &DataType::Float64)?;
            let numbers = numbers
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| WhistleError::Internal("Failed to read numeric column".to_string()))?;
            values.extend(numbers.iter().flatten().filter(|v| !v.is_nan()));
        }
        Ok(values)
    }

    /// Parses a text column as timestamps and, when every value parses,
    /// re-registers the table with the converted column.
    ///
    /// Returns false without touching the registration when a value fails.
    async fn convert_to_timestamps(&self, column: &str, format: Option<&str>) -> Result<bool> {
        let df = self.ctx.table(self.table_name.as_str()).await?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        let index = schema.index_of(column)?;

        let mut new_batches = Vec::with_capacity(batches.len());
        let new_schema = Arc::new(timestamp_schema(&schema, index));
        for batch in &batches {
            let strings = cast(batch.column(index), &DataType::Utf8)?;
            let strings = strings
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| WhistleError::Internal("Failed to read string column".to_string()))?;

            let mut timestamps = Vec::with_capacity(strings.len());
            for value in strings.iter() {
                match value {
                    None => timestamps.push(None),
                    Some(v) if v.trim().is_empty() => timestamps.push(None),
                    Some(v) => match parse_timestamp(v, format) {
                        Some(ts) => timestamps.push(Some(ts)),
                        None => {
                            debug!(column.name = %column, value = %v, "Value is not a datetime");
                            return Ok(false);
                        }
                    },
                }
            }

            let mut columns = batch.columns().to_vec();
            columns[index] = Arc::new(TimestampNanosecondArray::from(timestamps));
            new_batches.push(RecordBatch::try_new(Arc::clone(&new_schema), columns)?);
        }

        let table = MemTable::try_new(new_schema, vec![new_batches])?;
        self.ctx.deregister_table(self.table_name.as_str())?;
        self.ctx
            .register_table(self.table_name.as_str(), Arc::new(table))?;
        debug!(
            table.name = %self.table_name,
            column.name = %column,
            "Re-registered table with timestamp column"
        );
        Ok(true)
    }
}

/// Copies `schema` with the field at `index` turned into a nullable
/// nanosecond timestamp.
fn timestamp_schema(schema: &Schema, index: usize) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if i == index {
                Field::new(
                    field.name(),
                    DataType::Timestamp(TimeUnit::Nanosecond, None),
                    true,
                )
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}

/// Parses one text value as a timestamp in nanoseconds.
fn parse_timestamp(value: &str, format: Option<&str>) -> Option<i64> {
    let value = value.trim();
    let parsed = match format {
        Some(format) => parse_with_format(value, format),
        None => DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| {
                DATETIME_FORMATS
                    .iter()
                    .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
            })
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }),
    };
    parsed.and_then(|dt| dt.and_utc().timestamp_nanos_opt())
}

fn parse_with_format(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

/// Percentile with linear interpolation between the closest ranks.
/// `sorted` must be non-empty and sorted ascending.
pub(crate) fn percentile(sorted: &[f64], p: f64) -> f64 {
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

fn is_temporal_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _)
    )
}

#[async_trait]
impl CheckBackend for InMemoryBackend {
    fn description(&self) -> String {
        format!("in-memory table {}", self.table_name)
    }

    #[instrument(skip(self))]
    async fn check_row_count(&self, count: i64, operator: &Operator) -> Result<CheckOutcome> {
        if !operator.is_recognized() {
            return Ok(CheckOutcome::fail(messages::row_count_operator(operator)));
        }
        let sql = format!("SELECT COUNT(*) FROM {}", self.table_identifier()?);
        let rows = self.query_count(&sql).await?;
        let passed = operator.compare(rows, count as f64).unwrap_or(false);
        Ok(CheckOutcome::from_predicate(passed, || {
            messages::row_count(operator, count, rows)
        }))
    }

    #[instrument(skip(self))]
    async fn check_no_duplicate_rows(&self) -> Result<CheckOutcome> {
        let table = self.table_identifier()?;
        let rows = self
            .query_count(&format!("SELECT COUNT(*) FROM {table}"))
            .await?;
        let distinct = self
            .query_count(&format!(
                "SELECT COUNT(*) FROM (SELECT DISTINCT * FROM {table}) AS distinct_rows"
            ))
            .await?;
        let duplicates = rows - distinct;
        Ok(CheckOutcome::from_predicate(duplicates == 0.0, || {
            messages::duplicate_rows(duplicates)
        }))
    }

    async fn check_column_exists(&self, column: &str) -> Result<CheckOutcome> {
        let found = self.field(column).await?.is_some();
        Ok(CheckOutcome::from_predicate(found, || {
            format!("column {column} not found in data")
        }))
    }

    async fn check_is_numeric(&self, column: &str) -> Result<CheckOutcome> {
        let field = self.require_field(column).await?;
        Ok(CheckOutcome::from_predicate(
            field.data_type().is_numeric(),
            || messages::not_numeric(column),
        ))
    }

    async fn check_is_string(&self, column: &str) -> Result<CheckOutcome> {
        let field = self.require_field(column).await?;
        Ok(CheckOutcome::from_predicate(
            is_string_type(field.data_type()),
            || messages::not_string(column),
        ))
    }

    #[instrument(skip(self))]
    async fn check_is_datetime(&self, column: &str, format: Option<&str>) -> Result<CheckOutcome> {
        let field = self.require_field(column).await?;
        if is_temporal_type(field.data_type()) {
            return Ok(CheckOutcome::pass());
        }
        if !is_string_type(field.data_type()) {
            return Ok(CheckOutcome::fail(messages::not_datetime(column)));
        }

        if self.convert_to_timestamps(column, format).await? {
            return Ok(CheckOutcome::pass());
        }
        Ok(match format {
            Some(format) => CheckOutcome::fail(messages::datetime_format(column, format)),
            None => CheckOutcome::fail(messages::not_datetime(column)),
        })
    }

    async fn check_no_blanks(&self, column: &str) -> Result<CheckOutcome> {
        let has_blanks = self
            .string_values(column)
            .await?
            .iter()
            .flatten()
            .any(|v| v.trim().is_empty());
        Ok(CheckOutcome::from_predicate(!has_blanks, || {
            messages::blanks(column)
        }))
    }

    async fn check_no_duplicates(&self, column: &str) -> Result<CheckOutcome> {
        let col = SqlSecurity::escape_identifier(column)?;
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT {col}), COUNT({col}) FROM {}",
            self.table_identifier()?
        );
        let row = self.query_row(&sql).await?;
        let value = |i: usize| row.get(i).copied().flatten().unwrap_or(0.0);
        let (total, distinct, non_null) = (value(0), value(1), value(2));
        let null_group = if total > non_null { 1.0 } else { 0.0 };
        let duplicates = total - distinct - null_group;
        Ok(CheckOutcome::from_predicate(duplicates == 0.0, || {
            messages::no_duplicates(column, duplicates)
        }))
    }

    async fn check_no_nulls(&self, column: &str) -> Result<CheckOutcome> {
        let sql = format!(
            "SELECT COUNT(*) - COUNT({}) FROM {}",
            SqlSecurity::escape_identifier(column)?,
            self.table_identifier()?
        );
        let nulls = self.query_count(&sql).await?;
        Ok(CheckOutcome::from_predicate(nulls == 0.0, || {
            messages::no_nulls(column, nulls)
        }))
    }

    #[instrument(skip(self))]
    async fn check_no_outliers(&self, column: &str) -> Result<CheckOutcome> {
        let mut values = self.numeric_values(column).await?;
        if values.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        values.sort_by(f64::total_cmp);

        let bounds = IqrBounds::from_quartiles(percentile(&values, 0.25), percentile(&values, 0.75));
        let outliers = values.iter().filter(|v| bounds.is_outlier(**v)).count();
        Ok(CheckOutcome::from_predicate(outliers == 0, || {
            format!(
                "column {column} has {outliers} outliers outside 1.5xIQR range [{}, {}]",
                format_number(round2(bounds.lower)),
                format_number(round2(bounds.upper))
            )
        }))
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
            "SELECT COUNT(DISTINCT {}) FROM {}",
            SqlSecurity::escape_identifier(column)?,
            self.table_identifier()?
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
        if !operator.is_recognized() {
            return Ok(CheckOutcome::fail(messages::value_operator(column, operator)));
        }
        let col = SqlSecurity::escape_identifier(column)?;
        let sql = format!(
            "SELECT MIN({col}), MAX({col}), COUNT(*) - COUNT({col}), COUNT(*) FROM {}",
            self.table_identifier()?
        );
        let row = self.query_row(&sql).await?;
        let (min, max) = (row.first().copied().flatten(), row.get(1).copied().flatten());
        let nulls = row.get(2).copied().flatten().unwrap_or(0.0);
        let rows = row.get(3).copied().flatten().unwrap_or(0.0);

        let outcome = match operator {
            Operator::Equal => {
                let all_equal = rows == 0.0
                    || (nulls == 0.0 && min == Some(value) && max == Some(value));
                CheckOutcome::from_predicate(all_equal, || {
                    format!(
                        "column {column} want all values = {}, got different values",
                        format_number(value)
                    )
                })
            }
            _ => {
                let actual = if *operator == Operator::AtLeast { min } else { max };
                match actual {
                    Some(actual) => CheckOutcome::from_predicate(
                        operator.compare(actual, value).unwrap_or(false),
                        || messages::value(column, operator, value, actual),
                    ),
                    None => CheckOutcome::fail(messages::value_all_null(column, operator, value)),
                }
            }
        };
        Ok(outcome)
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

        for value in self.string_values(column).await?.iter().flatten() {
            let found = pattern
                .find_iter(value)
                .find(|m| !m.as_str().is_empty())
                .map(|m| m.as_str().to_string());
            match (regex_type, found) {
                (RegexType::Mandatory, None) => {
                    return Ok(CheckOutcome::fail(format!(
                        "column {column} found a non matching regex record with rule {rule}"
                    )))
                }
                (RegexType::Exclude, Some(found)) => {
                    return Ok(CheckOutcome::fail(format!(
                        "column {column} found invalid regex {found} with rule {rule}"
                    )))
                }
                _ => {}
            }
        }
        Ok(CheckOutcome::pass())
    }
}
