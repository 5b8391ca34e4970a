//! Signed-cookie client identity.
//!
//! Every storage backend partitions records by an opaque client token
//! issued and verified here: a random 32-character id followed by the
//! hex HMAC-SHA256 of that id under a per-client secret key, 96
//! characters in total. Verification never rejects a request — any
//! token that fails to check out is silently replaced by a freshly
//! issued identity, favoring a working token over identity continuity.

pub mod error;
pub mod token;

pub use error::{IdentityError, Result};
pub use token::Token;

use pinhole_core::{ClientRecord, Storage};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Issues and verifies signed client tokens against a storage backend.
#[derive(Debug, Clone)]
pub struct IdentityService<S> {
    store: Arc<S>,
}

impl<S: Storage> IdentityService<S> {
    /// Creates a service over a shared storage backend.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Issues a brand-new identity.
    ///
    /// Generates the id and secret key, persists the empty
    /// [`ClientRecord`], and returns the signed token.
    pub async fn issue(&self) -> Result<Token> {
        let cookie = random_alnum(token::COOKIE_LENGTH);
        let key = random_alnum(token::KEY_LENGTH);

        self.store
            .write(ClientRecord::new(cookie.clone(), key.clone()))
            .await?;

        Ok(Token::sign(&key, &cookie))
    }

    /// Verifies a presented token.
    ///
    /// Returns `Ok(None)` for any malformed, unknown, or mis-signed
    /// value; storage faults propagate.
    pub async fn verify(&self, presented: &str) -> Result<Option<Token>> {
        let Some((cookie, signature)) = token::split(presented) else {
            return Ok(None);
        };

        let Some(record) = self.store.read_by_cookie(cookie).await? else {
            return Ok(None);
        };

        if token::verify_signature(&record.key, cookie, signature) {
            Ok(Some(Token::from_verified(presented)))
        } else {
            Ok(None)
        }
    }

    /// Returns a working token for the presented value.
    ///
    /// A valid token is handed back unchanged; anything else (absent,
    /// malformed, unknown id, bad signature) triggers silent re-issuance
    /// of a new identity.
    pub async fn ensure(&self, presented: Option<&str>) -> Result<Token> {
        if let Some(raw) = presented {
            if let Some(token) = self.verify(raw).await? {
                return Ok(token);
            }
            debug!("presented identity failed verification, issuing a new one");
        }
        self.issue().await
    }
}

fn random_alnum(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
