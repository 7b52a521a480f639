//! Signature engine: the QR integrity hash and the transport HMAC.
//!
//! Two independent primitives keyed by process configuration:
//!
//! - **Integrity hash**: `SHA-256(ticket_id ":" issued_at ":" hash_secret)`,
//!   embedded in every QR payload. Binds the ticket id and the issuance
//!   timestamp together.
//! - **Transport HMAC**: `HMAC-SHA256(hmac_secret, data)` over the serialized
//!   payload, sent alongside it by scanning clients.
//!
//! Both are rendered as 64 lowercase hex characters and verified with
//! [`constant_time_eq`], so response time does not depend on where the first
//! mismatching byte sits.
//!
//! A candidate that is not 64 hex characters is a caller bug, not a failed
//! verification, and is reported as a [`SignatureError`].

use crate::types::TicketId;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded SHA-256 digest or HMAC tag.
pub const DIGEST_HEX_LEN: usize = 64;

/// Errors raised by the signature engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// A signing secret was empty.
    #[error("Signing secret must not be empty")]
    EmptySecret,

    /// Candidate digest is not a 64-character hex string.
    #[error("Malformed digest: expected {DIGEST_HEX_LEN} hex characters")]
    MalformedDigest,

    /// Candidate HMAC signature is not a 64-character hex string.
    #[error("Malformed signature: expected {DIGEST_HEX_LEN} hex characters")]
    MalformedSignature,
}

/// Secrets the engine is keyed with. Loaded once at startup.
#[derive(Clone)]
pub struct SigningSecrets {
    hash_secret: String,
    hmac_secret: String,
}

impl SigningSecrets {
    /// Separate secrets for the integrity hash and the transport HMAC.
    #[must_use]
    pub fn new(hash_secret: impl Into<String>, hmac_secret: impl Into<String>) -> Self {
        Self {
            hash_secret: hash_secret.into(),
            hmac_secret: hmac_secret.into(),
        }
    }

    /// Use one secret for both primitives.
    #[must_use]
    pub fn shared(secret: impl Into<String>) -> Self {
        let secret = secret.into();
        Self {
            hash_secret: secret.clone(),
            hmac_secret: secret,
        }
    }
}

impl fmt::Debug for SigningSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecrets")
            .field("hash_secret", &"<redacted>")
            .field("hmac_secret", &"<redacted>")
            .finish()
    }
}

/// Computes and verifies integrity hashes and HMAC signatures.
///
/// Construct once from [`SigningSecrets`] and share behind an `Arc`.
#[derive(Clone)]
pub struct SignatureEngine {
    hash_secret: Vec<u8>,
    mac: HmacSha256,
}

impl SignatureEngine {
    /// Build an engine from the configured secrets.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::EmptySecret`] if either secret is empty.
    pub fn new(secrets: &SigningSecrets) -> Result<Self, SignatureError> {
        if secrets.hash_secret.is_empty() || secrets.hmac_secret.is_empty() {
            return Err(SignatureError::EmptySecret);
        }

        let mac = HmacSha256::new_from_slice(secrets.hmac_secret.as_bytes())
            .map_err(|_| SignatureError::EmptySecret)?;

        Ok(Self {
            hash_secret: secrets.hash_secret.as_bytes().to_vec(),
            mac,
        })
    }

    /// Integrity hash for a ticket id and issuance timestamp (epoch ms).
    #[must_use]
    pub fn hash(&self, ticket_id: &TicketId, issued_at: i64) -> String {
        hex::encode(self.hash_bytes(ticket_id, issued_at))
    }

    /// Verify a candidate integrity hash.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedDigest`] if `candidate` is not a
    /// 64-character hex string. A well-formed mismatch is `Ok(false)`.
    pub fn verify_hash(
        &self,
        ticket_id: &TicketId,
        issued_at: i64,
        candidate: &str,
    ) -> Result<bool, SignatureError> {
        let candidate = decode_tag(candidate).ok_or(SignatureError::MalformedDigest)?;
        let expected = self.hash_bytes(ticket_id, issued_at);
        Ok(constant_time_eq(&expected, &candidate))
    }

    /// HMAC-SHA256 signature of `data`, hex encoded.
    #[must_use]
    pub fn hmac_sign(&self, data: &[u8]) -> String {
        hex::encode(self.mac_bytes(data))
    }

    /// Verify an HMAC signature over `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MalformedSignature`] if `signature` is not a
    /// 64-character hex string. A well-formed mismatch is `Ok(false)`.
    pub fn verify_hmac(&self, data: &[u8], signature: &str) -> Result<bool, SignatureError> {
        let candidate = decode_tag(signature).ok_or(SignatureError::MalformedSignature)?;
        let expected = self.mac_bytes(data);
        Ok(constant_time_eq(&expected, &candidate))
    }

    fn hash_bytes(&self, ticket_id: &TicketId, issued_at: i64) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(ticket_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(issued_at.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(&self.hash_secret);
        hasher.finalize().to_vec()
    }

    fn mac_bytes(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

impl fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureEngine").finish_non_exhaustive()
    }
}

/// Decode a 64-character hex tag. Uppercase hex is accepted.
fn decode_tag(candidate: &str) -> Option<Vec<u8>> {
    if candidate.len() != DIGEST_HEX_LEN {
        return None;
    }
    hex::decode(candidate).ok()
}
