use thiserror::Error;

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// The downstream operation failed, either just now or in a cached earlier attempt.
    #[error("{0}")]
    OperationFailed(String),

    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// Another attempt for the same event holds the in-flight lock.
    #[error("Event '{0}' is already being processed")]
    InFlight(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl AppError {
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, AppError::OperationFailed(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
