//! Error types for sqlbridge

use thiserror::Error;

/// Result type alias for sqlbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for command formatting, execution and scanning
#[derive(Debug, Error)]
pub enum Error {
    /// Request shape the engine cannot execute (e.g. a nested batch)
    #[error("unsupported cmd: {0}")]
    Unsupported(String),

    /// Command rejected by the validator
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Value could not be encoded for the driver or the wire
    #[error("encode error: {0}")]
    Encode(String),

    /// Row decode/mapping error
    #[error("decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Malformed wire request (URL codec, JSON body, headers)
    #[error("codec error: {0}")]
    Codec(String),

    /// Scanning into a required destination produced no row
    #[error("not found")]
    NotFound,

    /// A result column has no destination field with a matching tag
    #[error("tag not found: {0}")]
    TagNotFound(String),

    /// Column count differs from the destination's field count
    #[error("field count mismatch: {columns} columns, {fields} fields")]
    FieldCount { columns: usize, fields: usize },

    /// Error reported by the database
    #[error("database error{}: {message}", code_suffix(.code))]
    Database {
        code: Option<String>,
        message: String,
    },

    /// Dialect-specific deadlock signal; safe to retry
    #[error("deadlock: {0}")]
    Deadlock(String),

    /// Database connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Pool error
    #[error("pool error: {0}")]
    Pool(String),

    /// HTTP transport failure; safe to retry
    #[error("transport error: {0}")]
    Transport(String),

    /// Gateway answered with a 5xx status
    #[error("server error: {0}")]
    ServerStatus(u16),

    /// Gateway answered with a 4xx status
    #[error("client error: {0}")]
    ClientStatus(u16),

    /// The call context was cancelled
    #[error("cancelled")]
    Cancelled,

    /// Token acquisition failed
    #[error("auth error: {0}")]
    Auth(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" {c}")).unwrap_or_default()
}

impl Error {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-request error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create a codec error
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Whether the retry driver should try the request again.
    ///
    /// Only deadlocks, transport failures and 5xx answers qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Deadlock(_) | Self::Transport(_) | Self::ServerStatus(_)
        )
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if this is a cancellation error
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The database error code, if the error came from the driver.
    pub fn db_code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Parse a tokio_postgres error into an [`Error::Database`] carrying the SQLSTATE.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = match db_err.constraint() {
                Some(constraint) => format!("{}: {}", constraint, db_err.message()),
                None => db_err.message().to_string(),
            };
            return Self::Database {
                code: Some(db_err.code().code().to_string()),
                message,
            };
        }
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Database {
            code: None,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for Error {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
