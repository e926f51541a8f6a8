use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use rustapi_pipeline::{ApiError, Request};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;

type HmacSha256Mac = Hmac<Sha256>;

/// Default number of random bytes in a generated token.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// The shared secret checksums are keyed with.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"***").finish()
    }
}

impl From<&str> for Secret {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Secret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

/// A CSRF token.
///
/// For allowed requests the guard stores the client's current token in the
/// request extensions, so handlers can hand it to page templates.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a new random CSRF token of the specified length.
    pub fn generate(length: usize) -> Self {
        let mut bytes = vec![0u8; length];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(&bytes))
    }

    /// Create a token from an existing string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token the CSRF guard attached to an allowed request.
    pub fn from_request(req: &Request) -> rustapi_pipeline::Result<Self> {
        req.extensions().get::<CsrfToken>().cloned().ok_or_else(|| {
            ApiError::internal(
                "CSRF token missing from request extensions. Ensure the CSRF plugin is registered.",
            )
        })
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CsrfToken").field(&"***").finish()
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keyed proof that a [`CsrfToken`] was issued by this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum(String);

impl Checksum {
    /// Create a checksum from an existing string.
    pub fn new(checksum: impl Into<String>) -> Self {
        Self(checksum.into())
    }

    /// Get the checksum string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Token and checksum primitives the guard is built on.
///
/// Implementations must be deterministic in `create_checksum` and must accept
/// in `verify_checksum` exactly the tokens `create_checksum` was computed over.
pub trait TokenCrypto: Send + Sync + 'static {
    /// Create a fresh, unguessable token.
    fn create_token(&self) -> CsrfToken;

    /// Derive the checksum of `token` under `secret`.
    fn create_checksum(&self, token: &CsrfToken, secret: &Secret) -> Checksum;

    /// Check that `checksum` was derived from `candidate` under `secret`.
    fn verify_checksum(&self, candidate: &str, checksum: &str, secret: &Secret) -> bool;
}

/// HMAC-SHA256 checksums over random URL-safe base64 tokens.
#[derive(Debug, Clone, Copy)]
pub struct HmacSha256 {
    token_length: usize,
}

impl HmacSha256 {
    /// Generate tokens from `token_length` random bytes.
    pub fn new(token_length: usize) -> Self {
        Self { token_length }
    }

    fn mac(secret: &Secret, token: &[u8]) -> HmacSha256Mac {
        let mut mac = <HmacSha256Mac as Mac>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(token);
        mac
    }
}

impl Default for HmacSha256 {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenCrypto for HmacSha256 {
    fn create_token(&self) -> CsrfToken {
        CsrfToken::generate(self.token_length)
    }

    fn create_checksum(&self, token: &CsrfToken, secret: &Secret) -> Checksum {
        let tag = Self::mac(secret, token.as_str().as_bytes()).finalize().into_bytes();
        Checksum(URL_SAFE_NO_PAD.encode(tag))
    }

    fn verify_checksum(&self, candidate: &str, checksum: &str, secret: &Secret) -> bool {
        if candidate.is_empty() || checksum.is_empty() {
            return false;
        }

        let Ok(expected) = URL_SAFE_NO_PAD.decode(checksum) else {
            return false;
        };

        Self::mac(secret, candidate.as_bytes())
            .verify_slice(&expected)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_url_safe_and_unique() {
        let first = CsrfToken::generate(DEFAULT_TOKEN_LENGTH);
        let second = CsrfToken::generate(DEFAULT_TOKEN_LENGTH);

        // 32 bytes = 43 base64 characters without padding
        assert_eq!(first.as_str().len(), 43);
        assert_ne!(first, second);
        assert!(first
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn checksum_verifies_its_own_token_only() {
        let crypto = HmacSha256::default();
        let secret = Secret::new("s1");
        let token = crypto.create_token();
        let checksum = crypto.create_checksum(&token, &secret);

        assert!(crypto.verify_checksum(token.as_str(), checksum.as_str(), &secret));
        assert!(!crypto.verify_checksum("forged", checksum.as_str(), &secret));
        assert!(!crypto.verify_checksum(token.as_str(), checksum.as_str(), &Secret::new("s2")));
    }

    #[test]
    fn checksum_is_deterministic() {
        let crypto = HmacSha256::default();
        let secret = Secret::new("s1");
        let token = CsrfToken::new("fixed");

        assert_eq!(
            crypto.create_checksum(&token, &secret),
            crypto.create_checksum(&token, &secret)
        );
    }

    #[test]
    fn malformed_or_empty_inputs_never_verify() {
        let crypto = HmacSha256::default();
        let secret = Secret::new("s1");
        let token = CsrfToken::new("abc");
        let checksum = crypto.create_checksum(&token, &secret);

        assert!(!crypto.verify_checksum("", checksum.as_str(), &secret));
        assert!(!crypto.verify_checksum("abc", "", &secret));
        assert!(!crypto.verify_checksum("abc", "not base64 !!", &secret));
        assert!(!crypto.verify_checksum("abc", &checksum.as_str()[..10], &secret));
    }

    #[test]
    fn debug_output_hides_values() {
        assert_eq!(format!("{:?}", Secret::new("hunter2")), "Secret(\"***\")");
        assert_eq!(format!("{:?}", CsrfToken::new("abc")), "CsrfToken(\"***\")");
    }
}
