//! Error types for Hikkoshi.
//!
//! Uses `thiserror` for structured error definitions, one enum per concern.
//! The binary wraps these in `anyhow` for context.

use thiserror::Error;

/// Error type for calls against either catalog service.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Credential missing, rejected, or expired beyond one refresh attempt
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service kept answering 429 until the retry budget ran out
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Any other non-2xx response
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Caller supplied parameters the service would reject
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Connection, TLS or timeout failure
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local I/O failure (e.g. binding the login listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Returns true for errors that should end the whole run rather than
    /// just the current item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Auth(_) | ApiError::RateLimitExceeded { .. })
    }

    /// Returns the HTTP status code if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error type for persisted state (checkpoint, snapshot, report).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read a state file
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: String,
        source: serde_json::Error,
    },

    /// Failed to write a state file
    #[error("Failed to save {path}: {message}")]
    WriteError { path: String, message: String },
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Error that terminates a reconciliation run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
