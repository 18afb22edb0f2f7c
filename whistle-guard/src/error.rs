//! Error types for the whistle data-quality library.
//!
//! Rule failures are never errors: a check that finds bad data returns a failing
//! [`CheckOutcome`](crate::core::CheckOutcome). The `WhistleError` enum covers the
//! other kind of failure, the infrastructure fault: a query that could not run, a
//! result that could not be read, a rules document with the wrong shape.

use crate::config::RulesError;
use thiserror::Error;

/// The main error type for the whistle library.
#[derive(Error, Debug)]
pub enum WhistleError {
    /// A backend could not evaluate a check.
    #[error("Check evaluation failed for '{check}': {message}")]
    CheckEvaluation {
        /// Name of the check being evaluated
        check: String,
        /// Detailed error message
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from data source operations.
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g., "CSV")
        source_type: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The remote query client failed or returned something unreadable.
    #[error("Query error ({backend}): {message}")]
    Query {
        /// Backend that issued the query (e.g., "bigquery")
        backend: String,
        /// Detailed error message
        message: String,
    },

    /// A remote query did not finish in time.
    #[error("Query timed out after {timeout:?}")]
    QueryTimeout {
        /// The timeout that elapsed
        timeout: std::time::Duration,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The rules document could not be applied to a suite.
    #[error(transparent)]
    Rules(#[from] RulesError),

    /// An identifier or literal was rejected before reaching a query.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, WhistleError>`.
pub type Result<T> = std::result::Result<T, WhistleError>;

impl WhistleError {
    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new check evaluation error.
    pub fn check_evaluation(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckEvaluation {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Creates a new query error.
    pub fn query(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error came from the rules document.
    pub fn is_rules_error(&self) -> bool {
        matches!(self, Self::Rules(_))
    }
}
