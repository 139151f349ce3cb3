//! Error types at the library seams
//!
//! Worker bodies and the binary use `anyhow` with context; these enums are
//! what library functions return so callers can match on the failure class.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Data source failures; all are transient from the worker's point of view
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Page render failures
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("page {0} is not registered")]
    UnknownPage(usize),

    #[error("page {page} failed: {message}")]
    Page { page: &'static str, message: String },

    #[error("page panicked: {0}")]
    Panic(String),
}
