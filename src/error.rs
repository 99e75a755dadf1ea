use crate::config::ConfigError;
use crate::modem::ModemError;
use std::fmt;

/// A specialized `Result` type for the binary and service layer.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// Library layers keep their own `thiserror` enums; this one only gathers
/// them for the front end and renders a sentence a person can act on.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Modem(ModemError),
    InvalidInput(String),
    /// A blocking task panicked or was cancelled.
    Task(String),
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
}

impl AppError {
    /// Short machine-readable tag, used in JSON error output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Modem(e) => e.kind(),
            Self::InvalidInput(_) => "invalid_input",
            Self::Task(_) => "task",
            Self::IoError(_) => "io",
            Self::SerdeError(_) => "serde",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration problem: {e}"),
            Self::Modem(e) => write!(f, "Modem operation failed: {e}"),
            Self::InvalidInput(details) => write!(f, "The request is invalid: {details}"),
            Self::Task(details) => write!(f, "Background task failed: {details}"),
            Self::IoError(e) => write!(f, "An I/O error occurred: {e}"),
            Self::SerdeError(e) => write!(f, "A serialization/deserialization error occurred: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Modem(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::SerdeError(e) => Some(e),
            Self::InvalidInput(_) | Self::Task(_) => None,
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<ModemError> for AppError {
    fn from(err: ModemError) -> Self {
        AppError::Modem(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Task(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeError(err)
    }
}
