//! EC public key interchange as a JSON Web Key
//!
//! The proof key's public half travels inside the stage-U request body so
//! the remote service can bind future signature verification to this
//! specific key. Coordinates are big-endian unsigned integers carried as
//! base64url text.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Curves supported by the EC JWK representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcCurve {
    /// NIST P-256 (secp256r1)
    #[serde(rename = "P-256")]
    P256,
    /// NIST P-384 (secp384r1)
    #[serde(rename = "P-384")]
    P384,
    /// NIST P-521 (secp521r1)
    #[serde(rename = "P-521")]
    P521,
}

impl EcCurve {
    /// The ECDSA algorithm identifier paired with this curve.
    pub fn algorithm(&self) -> &'static str {
        match self {
            EcCurve::P256 => "ES256",
            EcCurve::P384 => "ES384",
            EcCurve::P521 => "ES512",
        }
    }
}

/// EC public key in JWK format.
///
/// `x` and `y` are the base64url-encoded big-endian coordinate bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcJsonWebKey {
    /// Key type, always `"EC"`
    #[serde(rename = "kty")]
    pub key_type: String,
    /// Signing algorithm implied by the curve (`ES256`/`ES384`/`ES512`)
    #[serde(rename = "alg", skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Curve tag
    #[serde(rename = "crv")]
    pub curve: EcCurve,
    /// X coordinate, base64url
    pub x: String,
    /// Y coordinate, base64url
    pub y: String,
}

impl EcJsonWebKey {
    /// Builds a JWK from raw big-endian coordinate bytes.
    pub fn from_coordinates(curve: EcCurve, x: &[u8], y: &[u8]) -> Self {
        Self {
            key_type: "EC".to_string(),
            algorithm: Some(curve.algorithm().to_string()),
            curve,
            x: base64url_encode(x),
            y: base64url_encode(y),
        }
    }

    /// Decodes the X coordinate back to bytes.
    pub fn x_bytes(&self) -> Result<Vec<u8>, JwkError> {
        base64url_decode(&self.x)
    }

    /// Decodes the Y coordinate back to bytes.
    pub fn y_bytes(&self) -> Result<Vec<u8>, JwkError> {
        base64url_decode(&self.y)
    }
}

#[derive(Debug, Error)]
pub enum JwkError {
    /// String length mod 4 was 1, which no base64url value can have
    #[error("Illegal base64url string length")]
    IllegalLength,
    /// The re-padded string was not valid base64
    #[error("Invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Encodes bytes as base64url without padding.
///
/// Standard base64, trailing `=` stripped, `+` and `/` substituted with the
/// URL-safe alphabet.
pub fn base64url_encode(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    encoded
        .trim_end_matches('=')
        .replace('+', "-")
        .replace('/', "_")
}

/// Decodes a base64url string produced by [`base64url_encode`].
///
/// Reverses the alphabet substitution and re-pads to a multiple of four
/// characters before handing off to the standard decoder.
pub fn base64url_decode(text: &str) -> Result<Vec<u8>, JwkError> {
    let mut s = text.replace('-', "+").replace('_', "/");
    match s.len() % 4 {
        0 => {}
        2 => s.push_str("=="),
        3 => s.push('='),
        _ => return Err(JwkError::IllegalLength),
    }
    Ok(STANDARD.decode(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_lengths() {
        for len in 0..=66 {
            let bytes: Vec<u8> = (0..len as u8).collect();
            let encoded = base64url_encode(&bytes);
            let decoded = base64url_decode(&encoded).unwrap();
            assert_eq!(decoded, bytes, "length {}", len);
        }
    }

    #[test]
    fn test_encode_never_emits_reserved_characters() {
        // 0xfb 0xff forces '+' and '/' in standard base64
        let bytes = vec![0xfb, 0xef, 0xff, 0xfe, 0x3f, 0x00];
        let encoded = base64url_encode(&bytes);
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }

    #[test]
    fn test_decode_rejects_length_mod_four_of_one() {
        assert!(matches!(
            base64url_decode("abcde"),
            Err(JwkError::IllegalLength)
        ));
        assert!(matches!(base64url_decode("a"), Err(JwkError::IllegalLength)));
    }

    #[test]
    fn test_decode_handles_substituted_alphabet() {
        let bytes = vec![0xfb, 0xef, 0xff];
        let encoded = base64url_encode(&bytes);
        assert_eq!(base64url_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_jwk_wire_field_names() {
        let jwk = EcJsonWebKey::from_coordinates(EcCurve::P256, &[1u8; 32], &[2u8; 32]);
        let json = serde_json::to_value(&jwk).unwrap();

        assert_eq!(json["kty"], "EC");
        assert_eq!(json["alg"], "ES256");
        assert_eq!(json["crv"], "P-256");
        assert!(json["x"].is_string());
        assert!(json["y"].is_string());
    }

    #[test]
    fn test_jwk_coordinate_round_trip() {
        let x: Vec<u8> = (0..32).collect();
        let y: Vec<u8> = (32..64).collect();
        let jwk = EcJsonWebKey::from_coordinates(EcCurve::P256, &x, &y);

        assert_eq!(jwk.x_bytes().unwrap(), x);
        assert_eq!(jwk.y_bytes().unwrap(), y);
    }

    #[test]
    fn test_curve_algorithm_pairing() {
        assert_eq!(EcCurve::P256.algorithm(), "ES256");
        assert_eq!(EcCurve::P384.algorithm(), "ES384");
        assert_eq!(EcCurve::P521.algorithm(), "ES512");
    }

    #[test]
    fn test_jwk_deserializes_from_wire_json() {
        let json = r#"{"kty":"EC","alg":"ES256","crv":"P-256","x":"AQAB","y":"AgIC"}"#;
        let jwk: EcJsonWebKey = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.curve, EcCurve::P256);
        assert_eq!(jwk.x_bytes().unwrap(), vec![0x01, 0x00, 0x01]);
    }
}
