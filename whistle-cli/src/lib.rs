//! Command-line runner for whistle rules.
//!
//! `main` only parses arguments and sets up logging; everything else lives
//! here so tests can drive a full run against an in-memory writer.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use whistle_guard::backend::{CheckBackend, RemoteBackend, RemoteConfig};
use whistle_guard::config::load_rules_file;
use whistle_guard::core::{CheckEvent, CheckObserver, TableCheckSuite};
use whistle_guard::error::WhistleError;
use whistle_guard::formatters::{
    FormatterConfig, HumanFormatter, JsonFormatter, ResultFormatter, RunReport,
};
use whistle_guard::sources::CsvSource;

/// Run data-quality rules against a CSV file or a BigQuery table.
#[derive(Debug, Parser)]
#[command(name = "whistle", version, about)]
pub struct Cli {
    /// CSV file to check
    #[arg(
        long,
        value_name = "FILE",
        required_unless_present = "bq_dataset",
        conflicts_with = "bq_dataset"
    )]
    pub csv: Option<PathBuf>,

    /// BigQuery dataset holding the table
    #[arg(long, value_name = "DATASET", requires = "bq_table")]
    pub bq_dataset: Option<String>,

    /// BigQuery table to check
    #[arg(long, value_name = "TABLE", requires = "bq_dataset")]
    pub bq_table: Option<String>,

    /// YAML rules file
    #[arg(long, short, value_name = "FILE")]
    pub rules: PathBuf,

    /// Print progress and a summary line
    #[arg(long, short)]
    pub verbose: bool,

    /// Output format for the failure messages
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Time limit for each BigQuery query
    #[arg(long, value_name = "SECONDS", default_value_t = 120)]
    pub timeout: u64,

    /// Write logs to stderr as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// How failure messages are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One message per line
    Text,
    /// A JSON report object
    Json,
}

/// Process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every check passed
    Passed,
    /// At least one check failed
    ChecksFailed,
    /// The data file does not exist
    DataNotFound,
    /// The data could not be loaded
    DataLoadError,
    /// The rules file does not exist
    RulesNotFound,
    /// The rules document is invalid
    RulesConfigError,
    /// The rules file could not be read
    RulesLoadError,
    /// A check could not be evaluated
    Fault,
}

impl ExitStatus {
    /// The numeric process exit code.
    pub fn code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::ChecksFailed => 1,
            Self::DataNotFound => 2,
            Self::DataLoadError => 3,
            Self::RulesNotFound => 4,
            Self::RulesConfigError => 5,
            Self::RulesLoadError => 6,
            Self::Fault => 7,
        }
    }
}

/// Prints `.` for each passing check and `F` for each failing one.
pub struct ProgressObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ProgressObserver<W> {
    /// Creates an observer writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> CheckObserver for ProgressObserver<W> {
    fn on_check(&self, event: &CheckEvent<'_>) {
        let mark = if event.passed { "." } else { "F" };
        if let Ok(mut out) = self.out.lock() {
            // Progress is best effort; a closed stdout shows up in the final report.
            let _ = out.write_all(mark.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Runs the checks described by `cli`, writing results to `out`.
///
/// Returns `Err` only when `out` itself cannot be written.
pub async fn run<W: Write + Send>(cli: &Cli, out: &mut W) -> Result<ExitStatus> {
    let started = Instant::now();

    let backend = match load_backend(cli, out).await? {
        Ok(backend) => backend,
        Err(status) => return Ok(status),
    };
    let mut suite = TableCheckSuite::new(backend);

    if cli.verbose {
        write!(out, "Parsing rules file {} ... ", cli.rules.display())?;
        out.flush()?;
    }
    if !cli.rules.exists() {
        report_error(out, cli, &format!("rules file {} not found", cli.rules.display()))?;
        return Ok(ExitStatus::RulesNotFound);
    }
    let applied = load_rules_file(&cli.rules).and_then(|document| suite.apply_rules(&document));
    if let Err(e) = applied {
        let status = if e.is_rules_error() {
            ExitStatus::RulesConfigError
        } else {
            ExitStatus::RulesLoadError
        };
        report_error(out, cli, &format!("could not load rules file {}: {e}", cli.rules.display()))?;
        return Ok(status);
    }
    if cli.verbose {
        writeln!(out, "done.")?;
        write!(out, "Running checks ")?;
        out.flush()?;
    }

    let outcome = if cli.verbose {
        let observer = ProgressObserver::new(&mut *out);
        let outcome = suite.run_checks_with_observer(&observer).await;
        drop(observer);
        outcome
    } else {
        suite.run_checks().await
    };
    if let Err(e) = outcome {
        report_error(out, cli, &format!("could not run checks: {e}"))?;
        return Ok(ExitStatus::Fault);
    }
    if cli.verbose {
        writeln!(out, " done.")?;
    }

    let report = RunReport::from_suite(&suite)
        .with_duration_ms(started.elapsed().as_millis() as u64);
    let rendered = match cli.format {
        OutputFormat::Text => {
            let config = FormatterConfig::default()
                .with_summary(cli.verbose)
                .with_colors(false);
            HumanFormatter::with_config(config).format(&report)?
        }
        OutputFormat::Json => format!("{}\n", JsonFormatter::new().format(&report)?),
    };
    out.write_all(rendered.as_bytes())?;
    out.flush()?;

    info!(passed = report.passed, failures = report.failures.len(), "Run finished");
    Ok(if report.passed {
        ExitStatus::Passed
    } else {
        ExitStatus::ChecksFailed
    })
}

async fn load_backend<W: Write>(
    cli: &Cli,
    out: &mut W,
) -> io::Result<std::result::Result<Arc<dyn CheckBackend>, ExitStatus>> {
    if let (Some(dataset), Some(table)) = (&cli.bq_dataset, &cli.bq_table) {
        let config = RemoteConfig::default().with_timeout(Duration::from_secs(cli.timeout));
        return match RemoteBackend::with_bq_cli(dataset.as_str(), table.as_str(), config) {
            Ok(backend) => {
                let backend: Arc<dyn CheckBackend> = Arc::new(backend);
                Ok(Ok(backend))
            }
            Err(e) => {
                report_error(out, cli, &format!("invalid table reference: {e}"))?;
                Ok(Err(ExitStatus::DataLoadError))
            }
        };
    }

    let Some(path) = &cli.csv else {
        report_error(out, cli, "no data source given")?;
        return Ok(Err(ExitStatus::DataLoadError));
    };

    if cli.verbose {
        write!(out, "Reading data file {} ... ", path.display())?;
        out.flush()?;
    }
    if !path.exists() {
        report_error(out, cli, &format!("data file {} not found", path.display()))?;
        return Ok(Err(ExitStatus::DataNotFound));
    }
    match CsvSource::new(path).into_backend().await {
        Ok(backend) => {
            if cli.verbose {
                writeln!(out, "done.")?;
            }
            let backend: Arc<dyn CheckBackend> = Arc::new(backend);
            Ok(Ok(backend))
        }
        Err(e) => {
            report_error(out, cli, &format!("could not load data file: {}", describe(&e)))?;
            Ok(Err(ExitStatus::DataLoadError))
        }
    }
}

fn describe(e: &WhistleError) -> String {
    match std::error::Error::source(e) {
        Some(source) => format!("{e}: {source}"),
        None => e.to_string(),
    }
}

/// Finishes a pending verbose line, then reports the problem on stderr.
fn report_error<W: Write>(out: &mut W, cli: &Cli, message: &str) -> io::Result<()> {
    if cli.verbose {
        writeln!(out, "failed.")?;
    }
    debug!(reason = %message, "Run stopped");
    eprintln!("whistle: {message}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Passed.code(), 0);
        assert_eq!(ExitStatus::ChecksFailed.code(), 1);
        assert_eq!(ExitStatus::DataNotFound.code(), 2);
        assert_eq!(ExitStatus::DataLoadError.code(), 3);
        assert_eq!(ExitStatus::RulesNotFound.code(), 4);
        assert_eq!(ExitStatus::RulesConfigError.code(), 5);
        assert_eq!(ExitStatus::RulesLoadError.code(), 6);
        assert_eq!(ExitStatus::Fault.code(), 7);
    }

    #[test]
    fn test_parse_csv_args() {
        let cli = Cli::try_parse_from(["whistle", "--csv", "d.csv", "--rules", "r.yaml", "-v"])
            .unwrap();
        assert_eq!(cli.csv, Some(PathBuf::from("d.csv")));
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.timeout, 120);
    }

    #[test]
    fn test_parse_bigquery_args() {
        let cli = Cli::try_parse_from([
            "whistle",
            "--bq-dataset",
            "sales",
            "--bq-table",
            "orders",
            "--rules",
            "r.yaml",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.bq_dataset.as_deref(), Some("sales"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.csv.is_none());
    }

    #[test]
    fn test_parse_rejects_bad_combinations() {
        assert!(Cli::try_parse_from(["whistle", "--rules", "r.yaml"]).is_err());
        assert!(Cli::try_parse_from([
            "whistle", "--csv", "d.csv", "--bq-dataset", "s", "--bq-table", "t", "--rules", "r"
        ])
        .is_err());
        assert!(
            Cli::try_parse_from(["whistle", "--bq-dataset", "s", "--rules", "r.yaml"]).is_err()
        );
    }

    #[test]
    fn test_progress_observer() {
        use whistle_guard::core::CheckScope;

        let observer = ProgressObserver::new(Vec::new());
        for passed in [true, false, true] {
            observer.on_check(&CheckEvent {
                scope: CheckScope::Table,
                check: "row_count",
                passed,
            });
        }
        assert_eq!(observer.into_inner(), b".F.");
    }
}
