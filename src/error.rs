use thiserror::Error;

/// Application-level error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// The input could not be canonicalized into an http(s) URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An idempotency key was reused with a different canonical URL.
    #[error("idempotency key already used with a different request")]
    IdempotencyConflict,

    /// Request validation failed before reaching the store.
    #[error("validation error: {0}")]
    Validation(String),

    /// A store operation failed.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Shutdown in progress; never surfaced to clients.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
