//! Core check-suite types.
//!
//! ## Overview
//!
//! - **[`TableCheckSuite`]**: table-level rules plus an ordered list of columns
//! - **[`ColumnCheckSuite`]**: the rules configured for one column
//! - **[`CheckOutcome`]**: the pass/fail verdict of a single check
//! - **[`Operator`]**: `==`, `>=` or `<=` for count and value comparisons
//! - **[`CheckObserver`]**: a per-check progress callback
//!
//! ## Execution order
//!
//! ```text
//! TableCheckSuite::run_checks
//!     ├── table exists            (remote backends only)
//!     ├── no duplicate rows → row count max → row count min → row count
//!     └── for each column, in declaration order
//!         ├── column exists       (skips the column when missing)
//!         └── type → blanks → duplicates → nulls → outliers
//!             → count distinct max/min/exact → min → max → val → regex
//! ```
//!
//! With `stop_on_fail` set, the first failing table rule suppresses the column
//! phase, and the first column with a failure ends the column loop.

mod column;
pub mod observer;
mod outcome;
pub mod rules;
mod suite;
mod types;

pub use column::ColumnCheckSuite;
pub use observer::{CheckEvent, CheckObserver, CheckScope, NoopObserver};
pub use outcome::{format_number, CheckOutcome, Operator};
pub use rules::{ColumnRule, TableRule};
pub use suite::TableCheckSuite;
pub use types::{ColumnType, RegexType};
