use thiserror::Error;

use crate::errors::{CollectError, FetchError, PersistenceError};

/// Domain-specific errors for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Store operation failed: {message}")]
    Store { message: String },

    #[error("Network operation failed: {message}")]
    Network { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CliError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: format!("{err:#}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::Store {
                message: "File not found".to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::Store {
                message: "Permission denied".to_string(),
            },
            _ => Self::Store {
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<PersistenceError> for CliError {
    fn from(err: PersistenceError) -> Self {
        Self::Store {
            message: err.to_string(),
        }
    }
}

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

impl From<CollectError> for CliError {
    fn from(err: CollectError) -> Self {
        match err {
            CollectError::Fetch(err) => err.into(),
            CollectError::Persistence(err) => err.into(),
            err => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}

impl From<inquire::InquireError> for CliError {
    fn from(err: inquire::InquireError) -> Self {
        match err {
            inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted => {
                Self::UserCancelled
            }
            err => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}
