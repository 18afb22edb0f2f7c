//! Rendering of check results.
//!
//! A finished [`TableCheckSuite`] run is captured as a [`RunReport`] and
//! handed to a [`ResultFormatter`]: [`HumanFormatter`] for terminals and
//! [`JsonFormatter`] for programs.
//!
//! # Examples
//!
//! ```rust
//! use whistle_guard::formatters::{HumanFormatter, ResultFormatter, RunReport};
//!
//! let report = RunReport::new("in-memory table data", vec!["want row count <= 3, got 5".into()]);
//! let output = HumanFormatter::new().format(&report).unwrap();
//! assert_eq!(output, "want row count <= 3, got 5\n");
//! ```

use crate::core::TableCheckSuite;
use crate::prelude::*;
use serde::Serialize;
use std::fmt::Write;

/// The outcome of one suite run, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// What was checked (the backend description)
    pub target: String,
    /// Whether every check passed
    pub passed: bool,
    /// Failure messages in execution order
    pub failures: Vec<String>,
    /// Wall-clock run time, when measured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl RunReport {
    /// Creates a report from a target description and failure messages.
    pub fn new(target: impl Into<String>, failures: Vec<String>) -> Self {
        Self {
            target: target.into(),
            passed: failures.is_empty(),
            failures,
            duration_ms: None,
        }
    }

    /// Captures the messages left on a suite by its last run.
    pub fn from_suite(suite: &TableCheckSuite) -> Self {
        Self::new(suite.backend().description(), suite.error_messages.clone())
    }

    /// Records how long the run took.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Configuration options for rendering a report.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Prefix the messages with a pass/fail summary line
    pub include_summary: bool,
    /// Maximum number of messages to print (`None` for all)
    pub max_messages: Option<usize>,
    /// Colorize the summary line
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_summary: false,
            max_messages: None,
            use_colors: false,
        }
    }
}

impl FormatterConfig {
    /// Summary line plus every message, colorized.
    pub fn verbose() -> Self {
        Self {
            include_summary: true,
            max_messages: None,
            use_colors: true,
        }
    }

    /// Sets whether to print the summary line.
    pub fn with_summary(mut self, include: bool) -> Self {
        self.include_summary = include;
        self
    }

    /// Caps the number of printed messages.
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Sets whether to use colorized output.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Turns a [`RunReport`] into text.
pub trait ResultFormatter {
    /// Formats a report with the formatter's own configuration.
    fn format(&self, report: &RunReport) -> Result<String>;

    /// Formats a report with an explicit configuration.
    fn format_with_config(&self, report: &RunReport, _config: &FormatterConfig) -> Result<String> {
        self.format(report)
    }
}

/// One failure message per line, optionally behind a summary line.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    /// Creates a formatter that prints bare messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a formatter with the specified configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, report: &RunReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &RunReport, config: &FormatterConfig) -> Result<String> {
        let mut output = String::new();

        if config.include_summary {
            let summary = if report.passed {
                "All checks passed.".to_string()
            } else {
                format!("Checks failed ({}):", report.failures.len())
            };
            let line = match (config.use_colors, report.passed) {
                (true, true) => format!("\x1b[32m{summary}\x1b[0m"),
                (true, false) => format!("\x1b[31m{summary}\x1b[0m"),
                (false, _) => summary,
            };
            writeln!(output, "{line}").map_err(fmt_error)?;
        }

        let shown = config.max_messages.unwrap_or(report.failures.len());
        for message in report.failures.iter().take(shown) {
            writeln!(output, "{message}").map_err(fmt_error)?;
        }
        if report.failures.len() > shown {
            writeln!(output, "... and {} more", report.failures.len() - shown)
                .map_err(fmt_error)?;
        }

        Ok(output)
    }
}

/// The report as a JSON object.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a pretty-printing JSON formatter.
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    /// Creates a JSON formatter with the specified configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, report: &RunReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(&self, report: &RunReport, config: &FormatterConfig) -> Result<String> {
        let mut report = report.clone();
        if let Some(max) = config.max_messages {
            report.failures.truncate(max);
        }

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };
        rendered.map_err(|e| WhistleError::Internal(format!("Failed to serialize report: {e}")))
    }
}

fn fmt_error(e: std::fmt::Error) -> WhistleError {
    WhistleError::Internal(format!("Failed to format report: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn failing_report() -> RunReport {
        RunReport::new(
            "in-memory table data",
            vec![
                "want row count <= 3, got 5".to_string(),
                "column A has duplicates".to_string(),
            ],
        )
    }

    #[test]
    fn test_human_plain() {
        let output = HumanFormatter::new().format(&failing_report()).unwrap();
        assert_eq!(output, "want row count <= 3, got 5\ncolumn A has duplicates\n");

        let passing = RunReport::new("t", vec![]);
        assert_eq!(HumanFormatter::new().format(&passing).unwrap(), "");
    }

    #[test]
    fn test_human_summary() {
        let config = FormatterConfig::default().with_summary(true);
        let formatter = HumanFormatter::with_config(config);

        let output = formatter.format(&failing_report()).unwrap();
        assert!(output.starts_with("Checks failed (2):\n"));

        let output = formatter.format(&RunReport::new("t", vec![])).unwrap();
        assert_eq!(output, "All checks passed.\n");
    }

    #[test]
    fn test_human_max_messages() {
        let config = FormatterConfig::default().with_max_messages(1);
        let output = HumanFormatter::with_config(config)
            .format(&failing_report())
            .unwrap();
        assert_eq!(output, "want row count <= 3, got 5\n... and 1 more\n");
    }

    #[test]
    fn test_json() {
        let report = failing_report().with_duration_ms(12);
        let output = JsonFormatter::new().with_pretty(false).format(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["passed"], false);
        assert_eq!(value["failures"].as_array().unwrap().len(), 2);
        assert_eq!(value["duration_ms"], 12);
        assert_eq!(value["target"], "in-memory table data");

        let output = JsonFormatter::new().format(&RunReport::new("t", vec![])).unwrap();
        assert!(!output.contains("duration_ms"));
    }

    #[tokio::test]
    async fn test_report_from_suite() {
        let schema = Arc::new(Schema::new(vec![Field::new("A", DataType::Int64, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5]))],
        )
        .unwrap();
        let backend = InMemoryBackend::from_batches(schema, vec![batch]).unwrap();
        let mut suite = TableCheckSuite::new(Arc::new(backend));
        suite.row_count_max = Some(3);
        suite.run_checks().await.unwrap();

        let report = RunReport::from_suite(&suite);
        assert!(!report.passed);
        assert_eq!(report.failures, vec!["want row count <= 3, got 5"]);
    }
}
