//! Prelude for commonly used types and traits in whistle-guard.

pub use crate::error::{Result, WhistleError};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
