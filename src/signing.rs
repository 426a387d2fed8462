//! Single-use signing context
//!
//! An append-only byte accumulator over SHA-256. Every semantic element is
//! followed by a 0x00 terminator so that `"ab" + "c"` and `"a" + "bc"` hash
//! differently. The context is consumed by signing or verification, which
//! makes the at-most-once finalization a compile-time guarantee.

use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::SigningError;
use crate::filetime::is_valid_file_time;
use crate::proof_key::ProofKey;

/// Accumulates canonical bytes for one signature computation.
///
/// Not thread-safe; create one per signing operation and discard it after
/// use.
pub struct SigningContext {
    hasher: Sha256,
}

impl SigningContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Appends raw bytes to the running hash.
    pub fn add_bytes(&mut self, buffer: &[u8]) {
        self.hasher.update(buffer);
    }

    /// Appends a single 0x00 field terminator.
    pub fn add_null_byte(&mut self) {
        self.hasher.update([0u8]);
    }

    /// Appends the policy version as big-endian int32 plus terminator.
    pub fn sign_version(&mut self, version: i32) {
        self.add_bytes(&version.to_be_bytes());
        self.add_null_byte();
    }

    /// Appends a Windows file time as big-endian int64 plus terminator.
    ///
    /// Fails with `InvalidTimestamp` when the value is negative or exceeds
    /// the maximum representable file time.
    pub fn sign_timestamp(&mut self, timestamp: i64) -> Result<(), SigningError> {
        if !is_valid_file_time(timestamp) {
            return Err(SigningError::InvalidTimestamp(timestamp));
        }
        self.add_bytes(&timestamp.to_be_bytes());
        self.add_null_byte();
        Ok(())
    }

    /// Appends a text element (method, path, header value) plus terminator.
    ///
    /// Missing headers are signed as the empty string; the terminator still
    /// records the field's presence in the canonical sequence.
    pub fn sign_element(&mut self, element: &str) {
        self.add_bytes(element.as_bytes());
        self.add_null_byte();
    }

    /// Finalizes the hash and signs the digest with the proof key.
    pub fn into_signature(self, key: &ProofKey) -> Signature {
        key.sign_digest(self.hasher)
    }

    /// Finalizes the hash and checks a signature against the digest.
    pub fn verify(self, key: &VerifyingKey, signature: &Signature) -> bool {
        use p256::ecdsa::signature::DigestVerifier;
        key.verify_digest(self.hasher, signature).is_ok()
    }
}

impl Default for SigningContext {
    fn default() -> Self {
        Self::new()
    }
}
