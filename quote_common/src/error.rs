//! Error types shared by the quote client crates.
//!
//! The `QuoteError` enum unifies the failure cases of both transports, the wire
//! decoder and the client's configuration, so every layer can propagate a
//! single error type with `?`.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type for the quote distribution client.
#[derive(Error, Debug)]
pub enum QuoteError {
    /// I/O error originating from sockets, files or thread spawning.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// A base URL or endpoint could not be parsed or rewritten.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Invalid or incomplete client configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing a symbol list (file or command line).
    #[error("Parse symbols error: {0}")]
    ParseSymbols(String),

    /// HTTP request failed before a response was read (connect, timeout, body).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered the pull request with a non-success status.
    #[error("HTTP status {status} from {url}")]
    HttpStatus {
        /// Status code returned by the server.
        status: u16,
        /// Request URL, for the log line.
        url: String,
    },

    /// Streaming socket failed to open or broke while reading.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for QuoteError {
    fn from(err: PoisonError<T>) -> Self {
        QuoteError::MutexLock(err.to_string())
    }
}
