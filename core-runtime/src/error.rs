use thiserror::Error;

/// Errors raised while assembling the admin core.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of range or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid API base URL '{value}': {reason}")]
    InvalidUrl { value: String, reason: String },

    /// A bridge was not injected and no desktop default is compiled in.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A desktop default bridge could not be constructed.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
