use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Display;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of the opaque client id (the storage cookie).
pub const COOKIE_LENGTH: usize = 32;
/// Length of the per-client secret key.
pub const KEY_LENGTH: usize = 64;
/// Length of the hex-encoded HMAC-SHA256 signature.
pub const SIGNATURE_LENGTH: usize = 64;
/// Length of the full token: id followed by signature.
pub const TOKEN_LENGTH: usize = COOKIE_LENGTH + SIGNATURE_LENGTH;

/// A 96-character signed identity token: 32-char id + 64-char hex HMAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Signs `cookie` under `key` and assembles the full token.
    pub(crate) fn sign(key: &str, cookie: &str) -> Self {
        Self(format!("{}{}", cookie, sign(key, cookie)))
    }

    /// Wraps a raw value that already passed verification.
    pub(crate) fn from_verified(raw: &str) -> Self {
        Self(raw.to_string())
    }

    /// The 32-character client id used as the storage cookie.
    pub fn cookie(&self) -> &str {
        &self.0[..COOKIE_LENGTH]
    }

    /// The hex signature part of the token.
    pub fn signature(&self) -> &str {
        &self.0[COOKIE_LENGTH..]
    }

    /// The full 96-character token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the hex-encoded HMAC-SHA256 of `cookie` under `key`.
pub(crate) fn sign(key: &str, cookie: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("hmac key of any length is accepted");
    mac.update(cookie.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Splits a presented value into (cookie, signature).
///
/// Returns `None` unless the value is exactly [`TOKEN_LENGTH`] ASCII
/// characters with an alphanumeric id part and a hex signature part.
pub(crate) fn split(presented: &str) -> Option<(&str, &str)> {
    if presented.len() != TOKEN_LENGTH || !presented.is_ascii() {
        return None;
    }

    let (cookie, signature) = presented.split_at(COOKIE_LENGTH);
    if !cookie.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if !signature.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some((cookie, signature))
}

/// Recomputes the signature and compares it in constant time.
pub(crate) fn verify_signature(key: &str, cookie: &str, signature: &str) -> bool {
    let Ok(presented) = hex::decode(signature) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("hmac key of any length is accepted");
    mac.update(cookie.as_bytes());
    let expected = mac.finalize().into_bytes();

    presented.as_slice().ct_eq(expected.as_slice()).into()
}
