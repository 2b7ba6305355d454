//! Error types for the event-store crate.
//!
//! Each variant carries enough context (file path, event id, validation
//! issues) for the HTTP layer to choose a status code and for the CLI to
//! print a useful message.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading, writing or mutating the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error occurred while reading or writing the database file
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database file exists but is not a valid document
    #[error("Failed to parse database {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory database could not be serialized
    #[error("Failed to serialize database: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A registration referenced an event that does not exist
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// A registration payload failed validation.
    ///
    /// Every failing rule is reported, not just the first one.
    #[error("Invalid registration: {}", .0.join("; "))]
    InvalidRegistration(Vec<String>),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, StoreError>;
