use thiserror::Error;

/// Failures reported by host bridges.
///
/// Transport implementations report deadline and connection failures as
/// [`BridgeError::Timeout`] and [`BridgeError::Network`] so the API layer can
/// classify them without inspecting messages.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Request timed out")]
    Timeout,

    /// Connection refused, DNS failure, reset and similar.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
