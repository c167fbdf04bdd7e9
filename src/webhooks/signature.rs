//! Webhook signature verification using HMAC-SHA256.
//!
//! The orchestrator signs the raw request body with a shared secret and sends
//! the result in the `X-Cloud-Update-Signature` header as `sha256=<hex>`,
//! where `<hex>` is exactly 64 lowercase hex characters.
//!
//! The bytes passed to [`Authenticator::validate`] must be the exact bytes the
//! JSON parser consumes; nothing may be re-serialized or trimmed in between.

use std::fmt;

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-cloud-update-signature";

/// Prefix of the signature header value.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Length of a hex-encoded SHA-256 digest.
const SIGNATURE_HEX_LEN: usize = 64;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Errors constructing an [`Authenticator`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No secret was supplied.
    #[error("webhook secret is empty")]
    EmptySecret,

    /// The secret is shorter than [`MIN_SECRET_LEN`].
    #[error("webhook secret must be at least {min} bytes (got {0})", min = MIN_SECRET_LEN)]
    SecretTooShort(usize),

    /// The HMAC implementation rejected the key.
    #[error("invalid HMAC key")]
    InvalidKey,
}

/// Parses a signature header (e.g. `"sha256=abc123..."`) into raw digest bytes.
///
/// Returns `None` unless the value is the prefix followed by exactly 64
/// lowercase hex characters. Never panics.
///
/// # Examples
///
/// ```
/// use cloud_update::webhooks::parse_signature_header;
///
/// let header = format!("sha256={}", "ab".repeat(32));
/// assert_eq!(parse_signature_header(&header).map(|d| d.len()), Some(32));
///
/// // Missing prefix
/// assert!(parse_signature_header(&"ab".repeat(32)).is_none());
///
/// // Too short
/// assert!(parse_signature_header("sha256=abcd1234").is_none());
///
/// // Uppercase hex is not the canonical encoding
/// assert!(parse_signature_header(&format!("sha256={}", "AB".repeat(32))).is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix(SIGNATURE_PREFIX)?;

    if hex_sig.len() != SIGNATURE_HEX_LEN
        || !hex_sig
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }

    hex::decode(hex_sig).ok()
}

/// Formats a digest as a signature header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(signature))
}

/// Validates request signatures against a shared secret.
///
/// Immutable after construction; cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct Authenticator {
    /// Keyed MAC state, cloned for every computation.
    mac: HmacSha256,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Creates an authenticator for the given secret.
    ///
    /// Fails if the secret is empty or shorter than [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::SecretTooShort(secret.len()));
        }

        let mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidKey)?;
        Ok(Authenticator { mac })
    }

    /// Computes the raw HMAC-SHA256 digest of `payload`.
    pub fn compute_signature(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// Returns the header value a correctly signed request would carry.
    pub fn sign(&self, payload: &[u8]) -> String {
        format_signature_header(&self.compute_signature(payload))
    }

    /// Verifies a signature header value against the payload.
    ///
    /// Uses constant-time comparison of the digests.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> bool {
        let Some(expected) = parse_signature_header(signature_header) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Returns true iff the request carries a valid signature for `body`.
    ///
    /// A missing header, a non-UTF-8 header, a wrong prefix, a length
    /// mismatch and a digest mismatch all yield `false`.
    pub fn validate(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|header| self.verify(body, header))
    }
}
