//! Error types for signing and token exchange

use thiserror::Error;

/// Errors from the signing primitives (canonicalization, header encoding).
///
/// These are local programming-contract violations: they indicate a caller
/// passed malformed input, not a remote failure, and are never retried.
#[derive(Debug, Error)]
pub enum SigningError {
    /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A required field of the request was absent
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// Timestamp outside the valid Windows file-time range
    #[error("Not a valid Windows file time: {0}")]
    InvalidTimestamp(i64),

    /// Signature header was not valid base64 or was too short
    #[error("Malformed signature header")]
    MalformedSignatureHeader,
}

/// Errors from the token exchange chain.
///
/// Each stage of the chain fails with a distinct variant so callers can
/// show an actionable message for the stage that broke. The broker performs
/// no automatic retry; `NetworkOrTimeout` may be retried by re-invoking the
/// same call.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Caller passed malformed input (e.g. empty relying party)
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The interactive credential ticket could not be obtained
    #[error("Ticket acquisition failed: {0}")]
    TicketAcquisitionFailed(String),

    /// The user token service rejected or did not issue a token
    #[error("User token exchange failed: {0}")]
    UserTokenFailed(String),

    /// The relying-party token service rejected or did not issue a token.
    /// Carries the remote diagnostic text verbatim.
    #[error("Token retrieval failed for relying party {relying_party}: {diagnostic}")]
    RelyingPartyTokenFailed {
        /// The relying party the exchange was scoped to
        relying_party: String,
        /// Remote diagnostic message, verbatim
        diagnostic: String,
    },

    /// Transport-level failure at any stage (cached state is unchanged)
    #[error("Network error or timeout: {0}")]
    NetworkOrTimeout(String),

    /// Request signing failed
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
}
