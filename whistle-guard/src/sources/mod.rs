//! Data sources for the in-memory backend.
//!
//! A source registers itself as a named table in a DataFusion
//! [`SessionContext`]; [`InMemoryBackend`](crate::backend::InMemoryBackend)
//! then runs its checks against that table.

use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::fmt::Debug;

mod csv;

pub use csv::{CsvOptions, CsvSource};

/// A data source that can be registered with a DataFusion context.
///
/// # Examples
///
/// ```rust,no_run
/// use datafusion::prelude::SessionContext;
/// use whistle_guard::sources::{CsvSource, DataSource};
///
/// # async fn example() -> whistle_guard::error::Result<()> {
/// let source = CsvSource::new("data/users.csv");
/// let ctx = SessionContext::new();
/// source.register(&ctx, "users").await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Registers this source under `table_name`.
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()>;

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}
