use thiserror::Error;

/// Centralized error types for the application
///
/// Service-level failures have their own enums (`BreachError`, `ScanError`,
/// `QuizError`, `TransportError`); everything that crosses into the handler
/// layer is converted to this enum for consistent logging.
///
/// # Example
///
/// ```no_run
/// use cybertutor::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     log::error!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    /// Outbound chat transport errors (send, edit, file fetch)
    #[error("Transport error: {0}")]
    Transport(#[from] crate::conversation::transport::TransportError),

    /// Quiz catalog errors
    #[error("Quiz error: {0}")]
    Quiz(#[from] crate::services::quiz::QuizError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Validation(err.to_string())
    }
}
