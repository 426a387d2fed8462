//! Signature policies
//!
//! A policy fixes everything the remote verifier needs to reconstruct the
//! canonical bytes: the version, which headers participate (in order), how
//! much of the body is covered, and the tolerated clock skew. One policy
//! exists per exchange stage; both stages of the chain currently share the
//! same shape.

use std::time::Duration;

/// Immutable signing policy for one request class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePolicy {
    /// Policy version, part of the signed bytes and the signature header
    pub version: i32,
    /// Signing algorithms the verifier accepts
    pub supported_algorithms: Vec<String>,
    /// Additional headers included in the signature. The listed order is
    /// semantically significant: it is part of the canonical byte sequence.
    pub extra_headers: Vec<String>,
    /// Maximum number of body bytes covered by the signature
    pub max_body_bytes: u64,
    /// Clock skew the verifier tolerates. Carried for the server-side
    /// verifier; not enforced during client-side signing.
    pub clock_skew: Duration,
}

impl SignaturePolicy {
    /// Policy for the stage-U (user token) endpoint.
    pub fn user_token() -> Self {
        Self {
            version: 1,
            supported_algorithms: vec!["ES256".to_string()],
            extra_headers: Vec::new(),
            max_body_bytes: u64::MAX,
            clock_skew: Duration::from_secs(15),
        }
    }

    /// Policy for the stage-X (relying-party token) endpoint.
    pub fn relying_party_token() -> Self {
        Self {
            version: 1,
            supported_algorithms: vec!["ES256".to_string()],
            extra_headers: Vec::new(),
            max_body_bytes: u64::MAX,
            clock_skew: Duration::from_secs(15),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_policies_share_shape() {
        let u = SignaturePolicy::user_token();
        let x = SignaturePolicy::relying_party_token();

        assert_eq!(u, x);
        assert_eq!(u.version, 1);
        assert_eq!(u.supported_algorithms, vec!["ES256"]);
        assert!(u.extra_headers.is_empty());
        assert_eq!(u.max_body_bytes, u64::MAX);
        assert_eq!(u.clock_skew, Duration::from_secs(15));
    }
}
