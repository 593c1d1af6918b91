//! Error types for the muwasala application.

/// Top-level error type for the application layer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration could not be read, parsed or validated.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The search library reported an error.
    #[error(transparent)]
    Search(#[from] muwasala_search::SearchError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
