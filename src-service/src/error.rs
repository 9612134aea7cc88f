//! Error types for sample ingestion and configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Recoverable failures on the sample ingestion path.
///
/// None of these are fatal: the sample is dropped and the condition is
/// counted or logged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    #[error("sample ring buffer overflow")]
    Overflow,
    #[error("channel index {0} out of range")]
    InvalidChannel(usize),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
