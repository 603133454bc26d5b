//! Error types for `Ductline` core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `Ductline` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while resolving configuration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A setting holds a value the server cannot run with.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
