//! Progress callbacks for suite runs.

/// Where a check ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckScope<'a> {
    /// A table-level rule
    Table,
    /// A rule on the named column
    Column(&'a str),
}

/// One evaluated check.
#[derive(Debug, Clone, Copy)]
pub struct CheckEvent<'a> {
    /// Table or column the check ran on
    pub scope: CheckScope<'a>,
    /// Short rule name, e.g. `row_count_max` or `column_exists`
    pub check: &'a str,
    /// Whether the check passed
    pub passed: bool,
}

/// Receives one event per evaluated check, in execution order.
///
/// The table existence precondition is not reported; column existence is.
pub trait CheckObserver: Send + Sync {
    /// Called after each check.
    fn on_check(&self, event: &CheckEvent<'_>);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CheckObserver for NoopObserver {
    fn on_check(&self, _event: &CheckEvent<'_>) {}
}
