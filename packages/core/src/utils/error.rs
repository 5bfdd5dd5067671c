// Типы ошибок

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<bincode::Error> for ConstructError {
    fn from(error: bincode::Error) -> Self {
        ConstructError::SerializationError(error.to_string())
    }
}

impl From<serde_json::Error> for ConstructError {
    fn from(error: serde_json::Error) -> Self {
        ConstructError::SerializationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConstructError>;
