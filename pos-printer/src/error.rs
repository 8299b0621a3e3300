//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Connection refused, host unreachable or name resolution failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or write deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The device answered but reported a failure (bad status, no success marker)
    #[error("Printer rejected job: {0}")]
    Rejected(String),

    /// HTTP transport fault that is neither a connect error nor a timeout
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
