//! Error types for the decision-tree chat.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    Server(#[from] tokio::task::JoinError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised while fetching or parsing the decision tree.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed decision tree from {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },
}

/// Errors raised by a conversation in response to user input.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Conversation has not started (decision tree unavailable)")]
    NotStarted,

    #[error("No option at index {index} ({available} available)")]
    NoSuchOption { index: usize, available: usize },

    #[error("A reply is still being typed")]
    Busy,

    #[error("Session {id} not found")]
    NotFound { id: String },
}

/// Result type alias for the chat.
pub type Result<T> = std::result::Result<T, Error>;
