//! Check outcomes and the comparison operators shared by count and value checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The result of evaluating a single check.
///
/// A failing outcome always carries a message. Passing outcomes carry an empty
/// message so that callers can treat the pair uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Whether the check passed
    pub passed: bool,
    /// Why the check failed; empty when it passed
    pub message: String,
}

impl CheckOutcome {
    /// Creates a passing outcome.
    pub fn pass() -> Self {
        Self {
            passed: true,
            message: String::new(),
        }
    }

    /// Creates a failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    /// Creates a passing outcome when `passed` is true, otherwise a failure built
    /// from `message`.
    pub fn from_predicate<F>(passed: bool, message: F) -> Self
    where
        F: FnOnce() -> String,
    {
        if passed {
            Self::pass()
        } else {
            Self::fail(message())
        }
    }

    /// Returns true if this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        !self.passed
    }
}

/// Comparison operator used by row count, count distinct and value checks.
///
/// Operators are parsed leniently: any string other than `==`, `>=` or `<=`
/// becomes [`Operator::Unrecognized`], which every check reports as a failure
/// instead of rejecting it up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    Equal,
    /// `>=`
    AtLeast,
    /// `<=`
    AtMost,
    /// Anything else, kept verbatim for the failure message
    Unrecognized(String),
}

impl Operator {
    /// Parses an operator symbol.
    pub fn parse(symbol: &str) -> Self {
        match symbol {
            "==" => Operator::Equal,
            ">=" => Operator::AtLeast,
            "<=" => Operator::AtMost,
            other => Operator::Unrecognized(other.to_string()),
        }
    }

    /// Returns the operator symbol.
    pub fn symbol(&self) -> &str {
        match self {
            Operator::Equal => "==",
            Operator::AtLeast => ">=",
            Operator::AtMost => "<=",
            Operator::Unrecognized(symbol) => symbol,
        }
    }

    /// Compares `actual` against `expected`.
    ///
    /// Returns `None` for an unrecognized operator.
    pub fn compare(&self, actual: f64, expected: f64) -> Option<bool> {
        match self {
            Operator::Equal => Some(actual == expected),
            Operator::AtLeast => Some(actual >= expected),
            Operator::AtMost => Some(actual <= expected),
            Operator::Unrecognized(_) => None,
        }
    }

    /// Returns true unless this is [`Operator::Unrecognized`].
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Operator::Unrecognized(_))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Formats a number the way check messages print it: integral values without a
/// fractional part, everything else with the shortest round-tripping form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
