use clap::Parser;
use std::process;
use tracing::Level;
use whistle_cli::{run, Cli, ExitStatus};
use whistle_guard::logging::setup::{init_logging, LoggingConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = LoggingConfig::default()
        .with_whistle_level(if cli.verbose { Level::INFO } else { Level::WARN })
        .with_json_format(cli.log_json);
    if let Err(e) = init_logging(logging) {
        eprintln!("whistle: could not set up logging: {e}");
    }

    let mut stdout = std::io::stdout();
    let status = match run(&cli, &mut stdout).await {
        Ok(status) => status,
        Err(e) => {
            eprintln!("whistle: {e:#}");
            ExitStatus::Fault
        }
    };
    process::exit(status.code());
}
