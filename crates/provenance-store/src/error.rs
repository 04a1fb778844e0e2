use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Key or directory does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller-supplied input was rejected before any mutation
    #[error("{0}")]
    Validation(String),

    /// Upload could not be read as an archive, or tried to escape its directory
    #[error("invalid archive: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("corrupt key file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
