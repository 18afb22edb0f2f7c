//! Table check suite: table-level rules plus an ordered list of column suites.

use super::column::ColumnCheckSuite;
use super::observer::{CheckEvent, CheckObserver, CheckScope, NoopObserver};
use super::rules::TableRule;
use super::{CheckOutcome, ColumnType};
use crate::backend::CheckBackend;
use crate::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// A set of rules for one table.
///
/// The suite owns its column suites and shares its backend with them. Runs are
/// sequential and repeatable: every call to [`run_checks`](Self::run_checks)
/// rebuilds [`error_messages`](Self::error_messages) from scratch.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use datafusion::prelude::*;
/// use whistle_guard::backend::InMemoryBackend;
/// use whistle_guard::core::TableCheckSuite;
///
/// # async fn example() -> whistle_guard::error::Result<()> {
/// let ctx = SessionContext::new();
/// ctx.register_csv("data", "sales.csv", CsvReadOptions::new()).await?;
///
/// let mut suite = TableCheckSuite::new(Arc::new(InMemoryBackend::new(ctx)));
/// suite.row_count_min = Some(1);
/// suite.add_column("price", "numeric").allow_nulls = false;
///
/// suite.run_checks().await?;
/// for message in &suite.error_messages {
///     println!("{message}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TableCheckSuite {
    /// Abort the whole run at the first failing check
    pub stop_on_fail: bool,
    /// Permit rows that duplicate other rows
    pub allow_duplicate_rows: bool,
    /// Upper bound on the row count
    pub row_count_max: Option<i64>,
    /// Lower bound on the row count
    pub row_count_min: Option<i64>,
    /// Exact row count
    pub row_count: Option<i64>,
    /// Failure messages from the most recent run, in execution order
    pub error_messages: Vec<String>,
    columns: Vec<ColumnCheckSuite>,
    backend: Arc<dyn CheckBackend>,
}

impl TableCheckSuite {
    /// Creates a suite with no active rules.
    pub fn new(backend: Arc<dyn CheckBackend>) -> Self {
        Self {
            stop_on_fail: false,
            allow_duplicate_rows: true,
            row_count_max: None,
            row_count_min: None,
            row_count: None,
            error_messages: Vec::new(),
            columns: Vec::new(),
            backend,
        }
    }

    /// Returns the backend shared by this suite and its columns.
    pub fn backend(&self) -> &Arc<dyn CheckBackend> {
        &self.backend
    }

    /// Appends a column suite bound to this suite's backend and returns it for
    /// configuration.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        column_type: impl Into<ColumnType>,
    ) -> &mut ColumnCheckSuite {
        let column = ColumnCheckSuite::new(Arc::clone(&self.backend), name, column_type);
        self.columns.push(column);
        let last = self.columns.len() - 1;
        &mut self.columns[last]
    }

    /// Removes every column suite.
    pub fn clear_columns(&mut self) {
        self.columns.clear();
    }

    /// Column suites in declaration order.
    pub fn columns(&self) -> &[ColumnCheckSuite] {
        &self.columns
    }

    /// Mutable access to the column suites.
    pub fn columns_mut(&mut self) -> &mut [ColumnCheckSuite] {
        &mut self.columns
    }

    /// Looks up a column suite by name.
    pub fn column(&self, name: &str) -> Option<&ColumnCheckSuite> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column suite by name for reconfiguration.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnCheckSuite> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Builds the active table rules in execution order.
    pub fn assemble_rules(&self) -> Vec<TableRule> {
        TableRule::assemble(
            self.allow_duplicate_rows,
            self.row_count_max,
            self.row_count_min,
            self.row_count,
        )
    }

    /// Returns true if the most recent run produced no failures.
    pub fn passed(&self) -> bool {
        self.error_messages.is_empty()
    }

    /// Runs all table and column rules.
    ///
    /// Rule failures land in [`error_messages`](Self::error_messages). The
    /// `Err` arm carries infrastructure faults only.
    pub async fn run_checks(&mut self) -> Result<()> {
        self.run_checks_with_observer(&NoopObserver).await
    }

    /// Runs all table and column rules, reporting each check to `observer`.
    #[instrument(skip(self, observer), fields(
        suite.backend = %self.backend.description(),
        suite.columns = self.columns.len(),
        suite.stop_on_fail = self.stop_on_fail
    ))]
    pub async fn run_checks_with_observer(&mut self, observer: &dyn CheckObserver) -> Result<()> {
        info!(
            suite.backend = %self.backend.description(),
            suite.columns = self.columns.len(),
            "Starting check suite"
        );
        let start_time = Instant::now();

        let exists = self.backend.check_table_exists().await?;
        if exists.is_failure() {
            info!(suite.backend = %self.backend.description(), "Table not found");
            self.error_messages = vec![exists.message];
            return Ok(());
        }

        self.error_messages.clear();
        let mut halted = false;
        for rule in self.assemble_rules() {
            let outcome = self.evaluate(&rule).await?;
            debug!(
                check.name = rule.name(),
                check.passed = outcome.passed,
                "Table check evaluated"
            );
            observer.on_check(&CheckEvent {
                scope: CheckScope::Table,
                check: rule.name(),
                passed: outcome.passed,
            });
            if outcome.is_failure() {
                self.error_messages.push(outcome.message);
                if self.stop_on_fail {
                    halted = true;
                    break;
                }
            }
        }

        if !halted {
            for column in &mut self.columns {
                let messages = column
                    .run_checks_with_observer(self.stop_on_fail, observer)
                    .await?;
                let failed = !messages.is_empty();
                self.error_messages.extend(messages);
                if failed && self.stop_on_fail {
                    break;
                }
            }
        }

        info!(
            suite.failures = self.error_messages.len(),
            suite.duration_ms = start_time.elapsed().as_millis() as u64,
            "Check suite completed"
        );
        Ok(())
    }

    async fn evaluate(&self, rule: &TableRule) -> Result<CheckOutcome> {
        match rule.row_count_bound() {
            Some((count, operator)) => self.backend.check_row_count(count, &operator).await,
            None => self.backend.check_no_duplicate_rows().await,
        }
    }
}
