use crate::error::StorageError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Length of every short code, in characters.
pub const TAG_LENGTH: usize = 8;

/// A validated 8-character alphanumeric short code.
///
/// Tags identify one shortened URL each and are never reused, even after
/// the entry they name has been soft-deleted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Creates a new `Tag` after validating the input.
    ///
    /// Valid tags are exactly 8 ASCII-alphanumeric characters.
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, StorageError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `Tag` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (generation, or a backend reading its own persisted rows).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates a random tag from the 62^8 alphanumeric space.
    ///
    /// Collisions are not checked here; see the storage contract for how
    /// each backend surfaces a colliding insert.
    pub fn generate() -> Self {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TAG_LENGTH)
            .map(char::from)
            .collect();
        Self(code)
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> std::result::Result<(), StorageError> {
        if code.len() != TAG_LENGTH {
            return Err(StorageError::InvalidData(format!(
                "tag must be exactly {} characters, got {}",
                TAG_LENGTH,
                code.len()
            )));
        }

        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidData(format!(
                "tag must contain only alphanumeric characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
