use thiserror::Error;

/// Main error type for MemViz
#[derive(Error, Debug)]
pub enum MemvizError {
    /// Preference / baseline store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote query service errors (network, non-2xx, bad payload)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Parse errors (NDJSON records, filter parameters)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using MemvizError
pub type Result<T> = std::result::Result<T, MemvizError>;
