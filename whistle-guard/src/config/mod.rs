//! Rules documents: YAML that configures a [`TableCheckSuite`].
//!
//! ```yaml
//! table:
//!   stop_on_fail: false
//!   allow_duplicate_rows: false
//!   row_count_min: 1
//! columns:
//!   - name: price
//!     type: numeric
//!     allow_nulls: false
//!     min: 0
//!   - name: code
//!     type: string
//!     regex_rule: "^[A-Z]{3}$"
//!     regex_type: mandatory
//! ```
//!
//! The document is parsed into a `serde_yaml::Value` and walked key by key, so
//! errors can name the offending key and column. Column order in the document
//! is the order in which columns are checked.

mod error;

pub use error::RulesError;

use crate::core::{ColumnCheckSuite, ColumnType, RegexType, TableCheckSuite};
use crate::prelude::*;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use tracing::{debug, info};

/// Accepted top-level keys. `dataset` is an alias of `table`.
pub const TOP_LEVEL_KEYS: &[&str] = &["table", "dataset", "columns"];

/// Accepted keys of the `table` section.
pub const TABLE_KEYS: &[&str] = &[
    "stop_on_fail",
    "allow_duplicate_rows",
    "row_count_max",
    "row_count_min",
    "row_count",
];

/// Accepted keys of a column entry.
pub const COLUMN_KEYS: &[&str] = &[
    "name",
    "type",
    "allow_blanks",
    "allow_duplicates",
    "allow_nulls",
    "allow_outliers",
    "count_distinct_max",
    "count_distinct_min",
    "count_distinct",
    "dateformat",
    "min",
    "max",
    "val",
    "regex_rule",
    "regex_type",
];

/// Reads and parses a rules file.
///
/// I/O failures surface as [`WhistleError::Io`]; a document that is not YAML
/// or whose top level is not a mapping surfaces as [`WhistleError::Rules`].
pub fn load_rules_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let document = parse_rules_str(&text, &path.display().to_string())?;
    info!(rules.file = %path.display(), "Loaded rules file");
    Ok(document)
}

/// Parses rules text. `origin` names the source in error messages.
pub fn parse_rules_str(text: &str, origin: &str) -> std::result::Result<Value, RulesError> {
    let document: Value = serde_yaml::from_str(text)?;
    if !document.is_mapping() {
        return Err(RulesError::NotAMapping {
            file: origin.to_string(),
        });
    }
    Ok(document)
}

/// Applies a parsed rules document to `suite`.
///
/// Columns are appended after any the suite already has. On error the suite may
/// hold part of the document and should be discarded.
pub fn apply_rules(document: &Value, suite: &mut TableCheckSuite) -> std::result::Result<(), RulesError> {
    let root = document.as_mapping().ok_or_else(|| RulesError::NotAMapping {
        file: "<document>".to_string(),
    })?;

    for key in root.keys() {
        let key = key_name(key);
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            return Err(RulesError::UnknownTopLevelKey(key));
        }
    }

    for section in ["table", "dataset"] {
        if let Some(table) = root.get(section) {
            apply_table(table, suite)?;
        }
    }

    if let Some(columns) = root.get("columns") {
        let entries = match columns {
            Value::Sequence(entries) => entries.as_slice(),
            Value::Null => &[],
            _ => return Err(RulesError::ColumnsNotList),
        };
        for entry in entries {
            let entry = entry.as_mapping().ok_or(RulesError::ColumnsNotList)?;
            apply_column(entry, suite)?;
        }
    }

    debug!(
        suite.columns = suite.columns().len(),
        suite.stop_on_fail = suite.stop_on_fail,
        "Applied rules document"
    );
    Ok(())
}

fn apply_table(section: &Value, suite: &mut TableCheckSuite) -> std::result::Result<(), RulesError> {
    let section = match section {
        Value::Mapping(section) => section,
        Value::Null => return Ok(()),
        _ => return Err(RulesError::TableNotMapping),
    };

    for (key, value) in section {
        let key = key_name(key);
        match key.as_str() {
            "stop_on_fail" => suite.stop_on_fail = bool_value(value, &key)?,
            "allow_duplicate_rows" => suite.allow_duplicate_rows = bool_value(value, &key)?,
            "row_count_max" => suite.row_count_max = Some(table_integer(value, &key)?),
            "row_count_min" => suite.row_count_min = Some(table_integer(value, &key)?),
            "row_count" => suite.row_count = Some(table_integer(value, &key)?),
            _ => return Err(RulesError::UnknownTableKey(key)),
        }
    }
    Ok(())
}

fn apply_column(entry: &Mapping, suite: &mut TableCheckSuite) -> std::result::Result<(), RulesError> {
    let name = match entry.get("name") {
        None | Some(Value::Null) => return Err(RulesError::MissingColumnName),
        Some(Value::String(name)) => name.clone(),
        Some(other) => return Err(RulesError::InvalidColumnName(display_value(other))),
    };
    let declared = match entry.get("type") {
        None | Some(Value::Null) => return Err(RulesError::MissingColumnType { column: name }),
        Some(value) => string_value(value, &name, "type")?,
    };

    for key in entry.keys() {
        let key = key_name(key);
        if !COLUMN_KEYS.contains(&key.as_str()) {
            return Err(RulesError::UnknownColumnKey { column: name, key });
        }
    }

    let column_type = ColumnType::parse(&declared);
    if !column_type.is_known() {
        return Err(RulesError::UnknownColumnType {
            column: name,
            column_type: declared,
        });
    }

    let column = suite.add_column(name.clone(), column_type);
    for (key, value) in entry {
        let key = key_name(key);
        apply_column_key(column, &name, &key, value)?;
    }
    Ok(())
}

fn apply_column_key(
    column: &mut ColumnCheckSuite,
    name: &str,
    key: &str,
    value: &Value,
) -> std::result::Result<(), RulesError> {
    let qualified = || format!("column {name} {key}");
    match key {
        "name" | "type" => {}
        "allow_blanks" => column.allow_blanks = bool_value(value, &qualified())?,
        "allow_duplicates" => column.allow_duplicates = bool_value(value, &qualified())?,
        "allow_nulls" => column.allow_nulls = bool_value(value, &qualified())?,
        "allow_outliers" => column.allow_outliers = bool_value(value, &qualified())?,
        "count_distinct_max" => column.count_distinct_max = Some(column_integer(value, name, key)?),
        "count_distinct_min" => column.count_distinct_min = Some(column_integer(value, name, key)?),
        "count_distinct" => column.count_distinct = Some(column_integer(value, name, key)?),
        "dateformat" => column.date_format = Some(string_value(value, name, key)?),
        "min" => column.min_val = Some(number_value(value, name, key)?),
        "max" => column.max_val = Some(number_value(value, name, key)?),
        "val" => column.val = Some(number_value(value, name, key)?),
        "regex_rule" => {
            let rule = string_value(value, name, key)?;
            if column.column_type != ColumnType::String {
                return Err(RulesError::RegexRequiresString {
                    column: name.to_string(),
                    column_type: column.column_type.to_string(),
                });
            }
            column.regex_rule = Some(rule);
        }
        "regex_type" => {
            let kind = string_value(value, name, key)?;
            column.regex_type = Some(RegexType::parse(&kind).ok_or_else(|| {
                RulesError::UnknownRegexType {
                    column: name.to_string(),
                    value: kind.clone(),
                }
            })?);
        }
        _ => {
            return Err(RulesError::UnknownColumnKey {
                column: name.to_string(),
                key: key.to_string(),
            })
        }
    }
    Ok(())
}

/// Renders a mapping key as text. YAML allows non-string keys.
fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => display_value(other),
    }
}

/// Renders a scalar the way it was written in the document.
fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}

/// Accepts `true`, `1`, `"true"`, `"True"`, `"1"` and their false counterparts.
fn bool_value(value: &Value, key: &str) -> std::result::Result<bool, RulesError> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) if !n.is_f64() => Some(true),
            Some(0) if !n.is_f64() => Some(false),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| RulesError::InvalidBool {
        key: key.to_string(),
        value: display_value(value),
    })
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if !n.is_f64() => n.as_i64(),
        _ => None,
    }
}

fn table_integer(value: &Value, key: &str) -> std::result::Result<i64, RulesError> {
    integer(value).ok_or_else(|| RulesError::TableInteger {
        key: key.to_string(),
        value: display_value(value),
    })
}

fn column_integer(value: &Value, column: &str, key: &str) -> std::result::Result<i64, RulesError> {
    integer(value).ok_or_else(|| RulesError::ColumnInteger {
        column: column.to_string(),
        key: key.to_string(),
        value: display_value(value),
    })
}

fn number_value(value: &Value, column: &str, key: &str) -> std::result::Result<f64, RulesError> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| RulesError::ColumnNumber {
        column: column.to_string(),
        key: key.to_string(),
        value: display_value(value),
    })
}

fn string_value(value: &Value, column: &str, key: &str) -> std::result::Result<String, RulesError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(RulesError::ColumnString {
            column: column.to_string(),
            key: key.to_string(),
            value: display_value(value),
        }),
    }
}

impl TableCheckSuite {
    /// Applies a parsed rules document to this suite.
    pub fn apply_rules(&mut self, document: &Value) -> Result<()> {
        apply_rules(document, self)?;
        Ok(())
    }
}
