//! Error types for medit-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using medit-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in medit-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Diagram not found
    #[error("Diagram not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote record store error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
