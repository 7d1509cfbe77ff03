use thiserror::Error;

/// Errors surfaced by the legacy facade and the backend it forwards to.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A legacy option or feature that is intentionally not bridged.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A legacy feature that is planned but not available yet.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// An operation was invoked before the state it needs exists
    /// (for example a terminal query call with no table bound).
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Raised by `show_error`; carries the HTTP status the legacy call asked for.
    #[error("{message}")]
    Runtime { message: String, status: u16 },

    #[error("{0}")]
    PageNotFound(String),
}

impl From<bb8::RunError<BridgeError>> for BridgeError {
    fn from(err: bb8::RunError<BridgeError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                BridgeError::ConnectionError("SQLite pool checkout timed out".into())
            }
        }
    }
}
