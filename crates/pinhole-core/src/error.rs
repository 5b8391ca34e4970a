use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure taxonomy shared by every storage backend.
///
/// Absence of a record is not an error: the read operations return
/// `Ok(None)` when nothing matches a cookie or tag. The variants here
/// describe real faults, plus the one recoverable condition
/// ([`DuplicateUrl`](StorageError::DuplicateUrl)) a caller is expected
/// to handle by resolving the existing tag via `tag_by_url`.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("url already has an active short code for this client: {0}")]
    DuplicateUrl(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage query failed: {0}")]
    Query(String),
}

impl StorageError {
    /// Returns `true` for the recoverable duplicate-URL condition.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StorageError::DuplicateUrl(_))
    }
}
