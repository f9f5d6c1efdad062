//! Error types for civiq

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// Never crosses the API boundary; the engine absorbs it.
    #[error("classification failed: {0}")]
    Classification(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caused by malformed or out-of-vocabulary caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::InvalidCategory(_)
                | Error::InvalidPriority(_)
                | Error::InvalidStatus(_)
        )
    }
}
