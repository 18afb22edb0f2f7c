//! Declared column types and regex rule kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type a column is declared to have.
///
/// The declared type decides which value rules are legal for the column:
/// min/max/value and outlier rules need [`ColumnType::Numeric`], blank checks
/// need [`ColumnType::String`] and date formats need [`ColumnType::Datetime`].
/// An [`ColumnType::Unknown`] type is accepted when a suite is built by hand and
/// fails the type check when the suite runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Integer, decimal or floating point values
    Numeric,
    /// Text values
    String,
    /// Dates or timestamps, possibly stored as text
    Datetime,
    /// A type name this library does not know
    Unknown(String),
}

impl ColumnType {
    /// Parses a declared type name.
    pub fn parse(name: &str) -> Self {
        match name {
            "numeric" => ColumnType::Numeric,
            "string" => ColumnType::String,
            "datetime" => ColumnType::Datetime,
            other => ColumnType::Unknown(other.to_string()),
        }
    }

    /// Returns the declared type name.
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::String => "string",
            ColumnType::Datetime => "datetime",
            ColumnType::Unknown(name) => name,
        }
    }

    /// Returns true for the three supported types.
    pub fn is_known(&self) -> bool {
        !matches!(self, ColumnType::Unknown(_))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        ColumnType::parse(name)
    }
}

/// How a regex rule applies to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegexType {
    /// Every non-null value must contain a match
    Mandatory,
    /// No value may contain a match
    Exclude,
}

impl RegexType {
    /// Parses a regex rule kind, returning `None` for anything unknown.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mandatory" => Some(RegexType::Mandatory),
            "exclude" => Some(RegexType::Exclude),
            _ => None,
        }
    }

    /// Returns the rule kind name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegexType::Mandatory => "mandatory",
            RegexType::Exclude => "exclude",
        }
    }
}

impl fmt::Display for RegexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
