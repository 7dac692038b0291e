//! Boot: logging init, argument parsing, config load.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::EngineConfig;
use crate::output::OutputFormat;

/// Initialise the tracing / logging subsystem.
///
/// Logs go to stderr so stdout carries records only.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logrec=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Parse multi-line log records into JSON lines or a table
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(name = "logrec", version, long_about = None)]
pub struct CliArgs {
    /// Config file (overrides LOGREC_CONFIG_FILE)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<String>,

    /// Output format (overrides the configured one)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Log files to parse
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

/// Parse arguments and load config.
/// Priority: command line > environment > config file > defaults
pub fn boot() -> anyhow::Result<(EngineConfig, CliArgs)> {
    info!("Starting logrec v{}", env!("CARGO_PKG_VERSION"));

    let args = CliArgs::parse();

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(format) = args.format {
        config.output.format = format;
    }

    info!(
        "Loaded configuration: max_line_length={}, max_concurrent_files={}, output={}",
        config.max_line_length,
        config.max_concurrent_files,
        config.output.format.as_str()
    );
    info!(
        "Timezones: local={}, display={}",
        config.local_timezone, config.display_timezone
    );

    Ok((config, args))
}
