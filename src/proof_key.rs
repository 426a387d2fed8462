//! Proof key lifecycle
//!
//! A proof key is the P-256 keypair bound to every signed request. Exactly
//! one key is live per broker; it is replaced (never mutated) at
//! construction and on sign-out, and every token issued against a discarded
//! key is unverifiable by design.

use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use sha2::Sha256;
use thiserror::Error;

use crate::jwk::{EcCurve, EcJsonWebKey};

/// P-256 ECDSA proof keypair.
pub struct ProofKey {
    signing_key: SigningKey,
}

impl ProofKey {
    /// Generates a fresh random proof key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Imports a proof key from a private-key byte blob produced by
    /// [`export`](Self::export).
    pub fn import(blob: &[u8]) -> Result<Self, ProofKeyError> {
        let signing_key =
            SigningKey::from_slice(blob).map_err(|_| ProofKeyError::InvalidKeyBytes)?;
        Ok(Self { signing_key })
    }

    /// Exports the private key as an opaque byte blob.
    pub fn export(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// The public (verifying) half of the keypair.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The public key as an EC JSON Web Key with big-endian coordinates.
    pub fn public_jwk(&self) -> EcJsonWebKey {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        // SAFETY: uncompressed points always carry x and y
        let x = point.x().expect("uncompressed point has x");
        let y = point.y().expect("uncompressed point has y");
        EcJsonWebKey::from_coordinates(EcCurve::P256, x, y)
    }

    /// Signs an accumulated SHA-256 digest.
    pub(crate) fn sign_digest(&self, digest: Sha256) -> Signature {
        use p256::ecdsa::signature::DigestSigner;
        self.signing_key.sign_digest(digest)
    }
}

impl std::fmt::Debug for ProofKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print private material
        f.debug_struct("ProofKey")
            .field("curve", &"P-256")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ProofKeyError {
    /// The blob was not a valid P-256 private scalar
    #[error("Invalid proof key bytes")]
    InvalidKeyBytes,
}
