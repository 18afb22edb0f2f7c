//! Identifier and literal handling for generated SQL.
//!
//! Column names come straight from the rules document and table names from the
//! command line, so every name is validated and quoted before it is spliced into
//! a query. DataFusion identifiers are quoted with double quotes, BigQuery
//! identifiers with backticks.

use crate::error::{Result, WhistleError};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LEN: usize = 300;
const MAX_PATTERN_LEN: usize = 1000;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes an identifier for DataFusion SQL.
    ///
    /// Column headers in CSV files may contain spaces or punctuation, so any
    /// non-empty name is accepted. Embedded double quotes are doubled.
    ///
    /// ```rust
    /// use whistle_guard::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("price").unwrap(), "\"price\"");
    /// assert_eq!(SqlSecurity::escape_identifier("unit \"net\"").unwrap(), "\"unit \"\"net\"\"\"");
    /// assert!(SqlSecurity::escape_identifier("").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates and quotes an identifier for BigQuery Standard SQL.
    ///
    /// Backticks and backslashes cannot be escaped inside a quoted BigQuery
    /// identifier, so they are rejected.
    pub fn escape_bigquery_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        if identifier.contains('`') || identifier.contains('\\') {
            return Err(WhistleError::SecurityError(format!(
                "BigQuery identifier cannot contain backticks or backslashes: '{identifier}'"
            )));
        }
        Ok(format!("`{identifier}`"))
    }

    /// Validates an identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(WhistleError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(WhistleError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LEN} characters)"
            )));
        }

        if identifier.contains('\0') {
            return Err(WhistleError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a dataset or table name used to address a remote table.
    ///
    /// These names end up unquoted in string literals of metadata queries, so
    /// they are held to the strict BigQuery naming rules.
    pub fn validate_table_name(name: &str) -> Result<()> {
        static TABLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"^[A-Za-z0-9_]+([.\-][A-Za-z0-9_]+)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        Self::validate_identifier(name)?;
        if !TABLE_NAME_REGEX.is_match(name) {
            return Err(WhistleError::SecurityError(format!(
                "Invalid table name: '{name}'. Names are letters, digits and underscores, joined by single dashes or dots"
            )));
        }
        Ok(())
    }

    /// Validates a regex pattern and returns it escaped for a single-quoted SQL
    /// string literal.
    pub fn validate_regex_pattern(pattern: &str) -> Result<String> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(WhistleError::SecurityError(format!(
                "Regex pattern too long (max {MAX_PATTERN_LEN} characters)"
            )));
        }

        if pattern.contains('\0') {
            return Err(WhistleError::SecurityError(
                "Regex pattern cannot contain null bytes".to_string(),
            ));
        }

        if let Err(e) = Regex::new(pattern) {
            return Err(WhistleError::SecurityError(format!(
                "Invalid regex pattern: {e}"
            )));
        }

        Ok(Self::escape_string_literal(pattern))
    }

    /// Escapes the contents of a single-quoted SQL string literal.
    pub fn escape_string_literal(value: &str) -> String {
        value.replace('\\', "\\\\").replace('\'', "\\'")
    }
}
