//! Request canonicalization and the signature header
//!
//! The deterministic byte sequence here is the contract surface the remote
//! verifier reconstructs bit-for-bit: policy version, timestamp, upper-cased
//! method, path-and-query exactly as sent (percent-encoding preserved), the
//! `Authorization` header, each policy header in listed order, then up to
//! `max_body_bytes` of the body. Every element is null-terminated.

use base64::{engine::general_purpose::STANDARD, Engine};
use p256::ecdsa::{Signature, VerifyingKey};

use crate::error::SigningError;
use crate::filetime::is_valid_file_time;
use crate::policy::SignaturePolicy;
use crate::proof_key::ProofKey;
use crate::signing::SigningContext;

/// Byte length of the version and timestamp prefix in the signature header.
const HEADER_PREFIX_LEN: usize = 4 + 8;

/// Looks up a header value by name, case-insensitively.
///
/// A missing header is signed as the empty string so the null terminator
/// still records the field's position.
fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> &'a str {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// Signs everything but the body: version, timestamp, method,
/// path-and-query, and the policy's headers.
///
/// Use [`sign_request`] when the whole body can be held in memory; even an
/// empty body must contribute its trailing null byte.
pub fn sign_prologue(
    context: &mut SigningContext,
    policy: &SignaturePolicy,
    timestamp: i64,
    method: &str,
    path_and_query: &str,
    headers: &[(String, String)],
) -> Result<(), SigningError> {
    if !is_valid_file_time(timestamp) {
        return Err(SigningError::InvalidTimestamp(timestamp));
    }
    if method.is_empty() {
        return Err(SigningError::MissingRequiredField("method"));
    }

    context.sign_version(policy.version);
    context.sign_timestamp(timestamp)?;
    context.sign_element(&method.to_ascii_uppercase());
    context.sign_element(path_and_query);
    sign_headers(context, headers, policy);
    Ok(())
}

/// Signs the entire request, body included.
pub fn sign_request(
    context: &mut SigningContext,
    policy: &SignaturePolicy,
    timestamp: i64,
    method: &str,
    path_and_query: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<(), SigningError> {
    sign_prologue(context, policy, timestamp, method, path_and_query, headers)?;

    // min with the actual length guarantees this fits in usize
    let covered = policy.max_body_bytes.min(body.len() as u64) as usize;
    context.add_bytes(&body[..covered]);
    context.add_null_byte();
    Ok(())
}

/// Adds the `Authorization` header (always, regardless of policy) and the
/// policy's extra headers in their listed order.
fn sign_headers(
    context: &mut SigningContext,
    headers: &[(String, String)],
    policy: &SignaturePolicy,
) {
    context.sign_element(header_value(headers, "Authorization"));

    for name in &policy.extra_headers {
        context.sign_element(header_value(headers, name));
    }
}

/// Encodes the signature header value:
/// `base64( BE int32 version ‖ BE int64 timestamp ‖ raw signature )`.
///
/// This token is the only signing artifact sent to the server, carried in a
/// single `Signature` header alongside the request.
pub fn create_signature_header(
    signature: &Signature,
    version: i32,
    timestamp: i64,
) -> Result<String, SigningError> {
    if !is_valid_file_time(timestamp) {
        return Err(SigningError::InvalidTimestamp(timestamp));
    }

    let sig_bytes = signature.to_bytes();
    let mut header = Vec::with_capacity(HEADER_PREFIX_LEN + sig_bytes.len());
    header.extend_from_slice(&version.to_be_bytes());
    header.extend_from_slice(&timestamp.to_be_bytes());
    header.extend_from_slice(&sig_bytes);

    Ok(STANDARD.encode(header))
}

/// Decodes a signature header back into its version, timestamp, and raw
/// signature.
pub fn parse_signature_header(header: &str) -> Result<(i32, i64, Signature), SigningError> {
    let bytes = STANDARD
        .decode(header)
        .map_err(|_| SigningError::MalformedSignatureHeader)?;
    if bytes.len() <= HEADER_PREFIX_LEN {
        return Err(SigningError::MalformedSignatureHeader);
    }

    let version = i32::from_be_bytes(
        bytes[..4]
            .try_into()
            .map_err(|_| SigningError::MalformedSignatureHeader)?,
    );
    let timestamp = i64::from_be_bytes(
        bytes[4..HEADER_PREFIX_LEN]
            .try_into()
            .map_err(|_| SigningError::MalformedSignatureHeader)?,
    );
    if !is_valid_file_time(timestamp) {
        return Err(SigningError::InvalidTimestamp(timestamp));
    }
    let signature = Signature::from_slice(&bytes[HEADER_PREFIX_LEN..])
        .map_err(|_| SigningError::MalformedSignatureHeader)?;

    Ok((version, timestamp, signature))
}

/// Canonicalizes a request, signs it, and returns the encoded signature
/// header value.
pub fn signature_for_request(
    key: &ProofKey,
    policy: &SignaturePolicy,
    timestamp: i64,
    method: &str,
    path_and_query: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<String, SigningError> {
    let mut context = SigningContext::new();
    sign_request(
        &mut context,
        policy,
        timestamp,
        method,
        path_and_query,
        headers,
        body,
    )?;
    let signature = context.into_signature(key);
    create_signature_header(&signature, policy.version, timestamp)
}

/// Verifies a signature header against a request, reconstructing the same
/// canonical bytes the signer produced.
///
/// Returns `Ok(false)` when the header parses but the signature, version,
/// or canonical bytes do not match.
pub fn verify_signature_header(
    header: &str,
    key: &VerifyingKey,
    policy: &SignaturePolicy,
    method: &str,
    path_and_query: &str,
    headers: &[(String, String)],
    body: &[u8],
) -> Result<bool, SigningError> {
    let (version, timestamp, signature) = parse_signature_header(header)?;
    if version != policy.version {
        return Ok(false);
    }

    let mut context = SigningContext::new();
    sign_request(
        &mut context,
        policy,
        timestamp,
        method,
        path_and_query,
        headers,
        body,
    )?;
    Ok(context.verify(key, &signature))
}
