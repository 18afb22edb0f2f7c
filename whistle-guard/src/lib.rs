//! # Whistle - declarative data-quality checks
//!
//! Whistle runs a suite of table-level and column-level rules against a
//! table and collects a human-readable message for every rule that fails.
//! Rules are plain fields on [`core::TableCheckSuite`] and
//! [`core::ColumnCheckSuite`], set directly or from a YAML rules document.
//!
//! The same suite runs against two backends:
//!
//! - [`backend::InMemoryBackend`]: a table registered in a DataFusion
//!   `SessionContext`, for example a CSV file loaded through
//!   [`sources::CsvSource`].
//! - [`backend::RemoteBackend`]: a BigQuery table, queried through the `bq`
//!   command-line client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use whistle_guard::core::TableCheckSuite;
//! use whistle_guard::sources::CsvSource;
//!
//! # async fn example() -> whistle_guard::error::Result<()> {
//! let backend = CsvSource::new("data/users.csv").into_backend().await?;
//! let mut suite = TableCheckSuite::new(Arc::new(backend));
//! suite.row_count_min = Some(1);
//!
//! let id = suite.add_column("id", "numeric");
//! id.allow_nulls = false;
//! id.allow_duplicates = false;
//!
//! suite.run_checks().await?;
//! for message in &suite.error_messages {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Rules documents
//!
//! ```yaml
//! table:
//!   row_count_max: 1000
//! columns:
//!   - name: id
//!     type: numeric
//!     allow_duplicates: false
//!   - name: email
//!     type: string
//!     regex_rule: "^[^@]+@[^@]+$"
//! ```
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use whistle_guard::core::TableCheckSuite;
//! # async fn example(mut suite: TableCheckSuite) -> whistle_guard::error::Result<()> {
//! let document = whistle_guard::config::load_rules_file("rules.yaml")?;
//! suite.apply_rules(&document)?;
//! suite.run_checks().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failures and faults
//!
//! A rule that finds bad data is a failure: it adds a message and the run
//! carries on. Anything that stops a check from being evaluated at all (a
//! query error, a timeout, an unreadable result) is a
//! [`error::WhistleError`] returned from `run_checks`.

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod security;
pub mod sources;
