//! Error types for the medichat library.

use thiserror::Error;

use crate::input::ValidationError;

/// Errors that can occur during chat and cache operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during cache or config file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON payload could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The message was rejected before any request was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The event stream could not be opened or broke mid-stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("Server returned status {0}")]
    Status(u16),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(String),

    /// Cache storage operation failed.
    #[error("Cache error: {0}")]
    Cache(String),
}

/// A specialized `Result` type for medichat operations.
pub type Result<T> = std::result::Result<T, Error>;
