use pinhole_core::StorageError;
use thiserror::Error;

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Identity failures are storage failures: malformed or mis-signed
/// tokens are recovered locally by re-issuance and never surface here.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
