use thiserror::Error;

/// Top-level error type for the Rise system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for RiseError` so that `?` works across crate
/// boundaries in the binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Trigger error: {0}")]
    Trigger(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for RiseError {
    fn from(err: toml::de::Error) -> Self {
        RiseError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RiseError {
    fn from(err: toml::ser::Error) -> Self {
        RiseError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RiseError {
    fn from(err: serde_json::Error) -> Self {
        RiseError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Rise operations.
pub type Result<T> = std::result::Result<T, RiseError>;
