//! ffindex
//!
//! Command line front end for the indexing library: scans media files into
//! index files, extracts audio to Wave64 and inspects existing indexes.

mod commands;
mod config;
mod config_file;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Cli, Command, LogSettings};
use crate::config_file::ConfigFile;
use crate::error::Result;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "ffindex";

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            if let Some(hint) = e.hint() {
                eprintln!("{}: {}", APP_NAME, hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.generate_config {
        config_file::generate_default_config(&cli.config)?;
        println!("Wrote default configuration to {}", cli.config.display());
        return Ok(());
    }

    let config = ConfigFile::load_or_default(&cli.config)?;
    init_logging(&config.log_settings());

    tracing::debug!("{} v{} starting", APP_NAME, VERSION);
    ffindex_lib::init().map_err(ffindex_lib::IndexError::from)?;
    ffindex_lib::install_log_filter();
    tracing::debug!("FFmpeg initialized: {}", ffindex_lib::ffmpeg_version_info());

    match cli.command {
        Some(Command::Index(args)) => {
            let settings = config.index_settings().apply_args(&args);
            tracing::debug!("Index settings: {:?}", settings);
            commands::run_index(&args, &settings)
        }
        Some(Command::Info(args)) => commands::run_info(&args),
        Some(Command::Timecodes(args)) => commands::run_timecodes(&args),
        None => Err(error::AppError::Config(
            "no command given, see --help".to_string(),
        )),
    }
}

/// Initialize logging with tracing
fn init_logging(settings: &LogSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ffindex={0},ffindex_lib={0},ffmpeg={0}", settings.level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if settings.json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_generate_config_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffindex.toml");
        let cli = Cli::try_parse_from([
            "ffindex",
            "--generate-config",
            "-c",
            path.to_str().unwrap(),
        ])
        .unwrap();
        run(cli).unwrap();
        assert!(ConfigFile::from_file(&path).is_ok());
    }
}
