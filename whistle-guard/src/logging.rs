//! Logging setup and helpers.
//!
//! The library only emits `tracing` events. Binaries decide where they go by
//! calling [`setup::init_logging`].

/// Longest SQL text written to a single log field.
pub const MAX_LOGGED_QUERY_LEN: usize = 512;

/// Truncates a string to at most `max_length` characters for logging.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        None => value.to_string(),
        Some((cut, _)) => format!("{}...(truncated)", &value[..cut]),
    }
}

/// Subscriber setup for binaries.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for dependencies
        pub level: Level,
        /// Log level for whistle crates
        pub whistle_level: Level,
        /// Emit JSON lines instead of human-readable text
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                whistle_level: Level::WARN,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Debug output from whistle, info from everything else.
        pub fn development() -> Self {
            Self {
                level: Level::INFO,
                whistle_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// JSON lines at info level, for log shippers.
        pub fn structured() -> Self {
            Self {
                level: Level::WARN,
                whistle_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Sets the log level for whistle crates.
        pub fn with_whistle_level(mut self, level: Level) -> Self {
            self.whistle_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                let whistle = self.whistle_level.as_str().to_lowercase();
                format!(
                    "{},whistle_guard={whistle},whistle_cli={whistle},whistle={whistle}",
                    self.level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global subscriber writing to stderr.
    ///
    /// `RUST_LOG` overrides the configured filter when set.
    ///
    /// ```rust,no_run
    /// use whistle_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
