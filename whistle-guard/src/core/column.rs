//! Column check suite: the rules configured for one column.

use super::observer::{CheckEvent, CheckObserver, CheckScope, NoopObserver};
use super::rules::ColumnRule;
use super::{CheckOutcome, ColumnType, Operator, RegexType};
use crate::backend::CheckBackend;
use crate::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Rules for a single column, evaluated through the owning table suite's backend.
///
/// Boolean `allow_*` fields default to `true`, which leaves the matching rule
/// inactive. `Option` fields are inactive while `None`.
#[derive(Debug, Clone)]
pub struct ColumnCheckSuite {
    /// Column name as it appears in the data
    pub name: String,
    /// Declared type
    pub column_type: ColumnType,
    /// Permit empty or whitespace-only strings
    pub allow_blanks: bool,
    /// Permit repeated values
    pub allow_duplicates: bool,
    /// Permit nulls
    pub allow_nulls: bool,
    /// Permit values outside the 1.5 IQR fence
    pub allow_outliers: bool,
    /// Upper bound on distinct values
    pub count_distinct_max: Option<i64>,
    /// Lower bound on distinct values
    pub count_distinct_min: Option<i64>,
    /// Exact number of distinct values
    pub count_distinct: Option<i64>,
    /// Lower bound on the column minimum
    pub min_val: Option<f64>,
    /// Upper bound on the column maximum
    pub max_val: Option<f64>,
    /// Value every row must equal
    pub val: Option<f64>,
    /// strftime-style format for datetime columns
    pub date_format: Option<String>,
    /// Regex applied to string values
    pub regex_rule: Option<String>,
    /// How `regex_rule` applies
    pub regex_type: Option<RegexType>,
    /// Failure messages from the most recent run
    pub error_messages: Vec<String>,
    backend: Arc<dyn CheckBackend>,
}

impl ColumnCheckSuite {
    /// Creates a column suite with no active rules besides the type check.
    pub fn new(
        backend: Arc<dyn CheckBackend>,
        name: impl Into<String>,
        column_type: impl Into<ColumnType>,
    ) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            allow_blanks: true,
            allow_duplicates: true,
            allow_nulls: true,
            allow_outliers: true,
            count_distinct_max: None,
            count_distinct_min: None,
            count_distinct: None,
            min_val: None,
            max_val: None,
            val: None,
            date_format: None,
            regex_rule: None,
            regex_type: None,
            error_messages: Vec::new(),
            backend,
        }
    }

    /// Builds the active rules in execution order.
    pub fn assemble_rules(&self) -> Vec<ColumnRule> {
        let mut rules = vec![ColumnRule::Type {
            column_type: self.column_type.clone(),
            date_format: self.date_format.clone(),
        }];
        if !self.allow_blanks {
            rules.push(ColumnRule::NoBlanks);
        }
        if !self.allow_duplicates {
            rules.push(ColumnRule::NoDuplicates);
        }
        if !self.allow_nulls {
            rules.push(ColumnRule::NoNulls);
        }
        if !self.allow_outliers {
            rules.push(ColumnRule::NoOutliers);
        }
        rules.extend(self.count_distinct_max.map(ColumnRule::CountDistinctMax));
        rules.extend(self.count_distinct_min.map(ColumnRule::CountDistinctMin));
        rules.extend(self.count_distinct.map(ColumnRule::CountDistinct));
        rules.extend(self.min_val.map(ColumnRule::MinValue));
        rules.extend(self.max_val.map(ColumnRule::MaxValue));
        rules.extend(self.val.map(ColumnRule::Value));
        if self.regex_rule.is_some() {
            rules.push(ColumnRule::Regex);
        }
        rules
    }

    /// Runs every active rule and returns the failure messages.
    pub async fn run_checks(&mut self, stop_on_fail: bool) -> Result<Vec<String>> {
        self.run_checks_with_observer(stop_on_fail, &NoopObserver)
            .await
    }

    /// Runs every active rule, reporting each check to `observer`.
    ///
    /// A missing column yields exactly one message and no other rule runs.
    #[instrument(skip(self, observer), fields(column.name = %self.name, column.type = %self.column_type))]
    pub async fn run_checks_with_observer(
        &mut self,
        stop_on_fail: bool,
        observer: &dyn CheckObserver,
    ) -> Result<Vec<String>> {
        let exists = self.backend.check_column_exists(&self.name).await?;
        observer.on_check(&CheckEvent {
            scope: CheckScope::Column(&self.name),
            check: "column_exists",
            passed: exists.passed,
        });
        if exists.is_failure() {
            debug!(column.name = %self.name, "Column not found, skipping column rules");
            self.error_messages = vec![exists.message.clone()];
            return Ok(vec![exists.message]);
        }

        self.error_messages.clear();
        for rule in self.assemble_rules() {
            let outcome = self.evaluate(&rule).await?;
            debug!(
                column.name = %self.name,
                check.name = rule.name(),
                check.passed = outcome.passed,
                "Column check evaluated"
            );
            observer.on_check(&CheckEvent {
                scope: CheckScope::Column(&self.name),
                check: rule.name(),
                passed: outcome.passed,
            });
            if outcome.is_failure() {
                self.error_messages.push(outcome.message);
                if stop_on_fail {
                    break;
                }
            }
        }
        Ok(self.error_messages.clone())
    }

    async fn evaluate(&self, rule: &ColumnRule) -> Result<CheckOutcome> {
        let column = self.name.as_str();
        let backend = &self.backend;
        match rule {
            ColumnRule::Type {
                column_type,
                date_format,
            } => self.check_type(column_type, date_format.as_deref()).await,
            ColumnRule::NoBlanks => {
                if self.column_type != ColumnType::String {
                    return Ok(CheckOutcome::fail(format!(
                        "column {column} cannot check for blanks in non-string column"
                    )));
                }
                backend.check_no_blanks(column).await
            }
            ColumnRule::NoDuplicates => backend.check_no_duplicates(column).await,
            ColumnRule::NoNulls => backend.check_no_nulls(column).await,
            ColumnRule::NoOutliers => {
                if self.column_type != ColumnType::Numeric {
                    return Ok(CheckOutcome::fail(format!(
                        "column {column} cannot check inter-quartile range on a non-numeric column"
                    )));
                }
                backend.check_no_outliers(column).await
            }
            ColumnRule::CountDistinctMax(n) => {
                backend
                    .check_count_distinct(column, *n, &Operator::AtMost)
                    .await
            }
            ColumnRule::CountDistinctMin(n) => {
                backend
                    .check_count_distinct(column, *n, &Operator::AtLeast)
                    .await
            }
            ColumnRule::CountDistinct(n) => {
                backend
                    .check_count_distinct(column, *n, &Operator::Equal)
                    .await
            }
            ColumnRule::MinValue(v) => {
                self.check_numeric_value(*v, Operator::AtLeast, "minimum value on")
                    .await
            }
            ColumnRule::MaxValue(v) => {
                self.check_numeric_value(*v, Operator::AtMost, "maximum value on")
                    .await
            }
            ColumnRule::Value(v) => {
                self.check_numeric_value(*v, Operator::Equal, "value of")
                    .await
            }
            ColumnRule::Regex => {
                backend
                    .check_regex(column, self.regex_rule.as_deref(), self.regex_type)
                    .await
            }
        }
    }

    async fn check_type(
        &self,
        column_type: &ColumnType,
        date_format: Option<&str>,
    ) -> Result<CheckOutcome> {
        let column = self.name.as_str();
        let outcome = match column_type {
            ColumnType::Numeric => self.backend.check_is_numeric(column).await?,
            ColumnType::String => self.backend.check_is_string(column).await?,
            ColumnType::Datetime => {
                return self.backend.check_is_datetime(column, date_format).await
            }
            ColumnType::Unknown(name) => {
                return Ok(CheckOutcome::fail(format!(
                    "column {column} could not be tested for type {name} (unknown type)"
                )))
            }
        };
        if outcome.passed && date_format.is_some() {
            return Ok(CheckOutcome::fail(format!(
                "column {column} cannot check date format on a non-datetime column"
            )));
        }
        Ok(outcome)
    }

    async fn check_numeric_value(
        &self,
        value: f64,
        operator: Operator,
        what: &str,
    ) -> Result<CheckOutcome> {
        if self.column_type != ColumnType::Numeric {
            return Ok(CheckOutcome::fail(format!(
                "column {} cannot check {what} a non-numeric column",
                self.name
            )));
        }
        self.backend.check_value(&self.name, value, &operator).await
    }
}
