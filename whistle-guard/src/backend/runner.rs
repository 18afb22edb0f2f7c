//! Query clients for the remote backend.

use crate::logging::{truncate_field, MAX_LOGGED_QUERY_LEN};
use crate::prelude::*;
use async_trait::async_trait;
use std::fmt::Debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs one SQL statement against the remote warehouse and returns the raw
/// JSON result text: an array of row objects.
#[async_trait]
pub trait QueryRunner: Debug + Send + Sync {
    /// Executes `sql` and returns the stdout of the query client.
    async fn run(&self, sql: &str) -> Result<String>;
}

/// How the `bq` command-line client is invoked.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Program to execute
    pub program: String,
    /// Arguments placed before the SQL text
    pub args: Vec<String>,
    /// Per-query time limit
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            program: "bq".to_string(),
            args: vec![
                "query".to_string(),
                "--nouse_legacy_sql".to_string(),
                "--format=json".to_string(),
                "--quiet=true".to_string(),
            ],
            timeout: Duration::from_secs(120),
        }
    }
}

impl RemoteConfig {
    /// Sets the per-query time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Shells out to the `bq` client, one process per query.
#[derive(Debug, Clone, Default)]
pub struct BqCommandRunner {
    config: RemoteConfig,
}

impl BqCommandRunner {
    /// Creates a runner with the given invocation settings.
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    /// The invocation settings.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }
}

#[async_trait]
impl QueryRunner for BqCommandRunner {
    async fn run(&self, sql: &str) -> Result<String> {
        let timeout = self.config.timeout;
        debug!(
            program = %self.config.program,
            query = %truncate_field(sql, MAX_LOGGED_QUERY_LEN),
            "Running remote query"
        );

        let result = tokio::time::timeout(timeout, async {
            let output = Command::new(&self.config.program)
                .args(&self.config.args)
                .arg(sql)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| {
                    WhistleError::query(
                        "bigquery",
                        format!("Failed to spawn {}: {e}", self.config.program),
                    )
                })?;

            if !output.status.success() {
                return Err(WhistleError::query(
                    "bigquery",
                    format!(
                        "Error executing bq command ({}): {} {}",
                        output.status,
                        String::from_utf8_lossy(&output.stdout).trim(),
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                ));
            }

            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        })
        .await;

        match result {
            Ok(inner) => inner,
            Err(_) => Err(WhistleError::QueryTimeout { timeout }),
        }
    }
}
