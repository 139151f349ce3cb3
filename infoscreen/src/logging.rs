//! Logger setup for the binary

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Build the logger: `RUST_LOG` or `info`, `debug` when `verbose`,
/// appending to `log_file` instead of stderr when given
pub fn builder(verbose: bool, log_file: Option<&Path>) -> Result<Builder> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    Ok(builder)
}

/// Install the global logger
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    builder(verbose, log_file)?
        .try_init()
        .context("Logger already initialized")
}
