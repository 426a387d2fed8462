//! Wire payload shapes for the exchange endpoints
//!
//! Field names follow the remote contract exactly; the domain types
//! (`UserToken`, `RelyingPartyToken`) carry parsed instants so expiry checks
//! never re-parse strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::jwk::EcJsonWebKey;

/// Stage-U (user token) request body.
#[derive(Debug, Clone, Serialize)]
pub struct UserTokenRequest {
    #[serde(rename = "RelyingParty")]
    pub relying_party: String,
    #[serde(rename = "TokenType")]
    pub token_type: String,
    #[serde(rename = "Properties")]
    pub properties: UserTokenProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTokenProperties {
    #[serde(rename = "AuthMethod")]
    pub auth_method: String,
    #[serde(rename = "SiteName")]
    pub site_name: String,
    /// The credential ticket, prefixed with `d=`
    #[serde(rename = "RpsTicket")]
    pub rps_ticket: String,
    /// Public half of the live proof key; the service binds future
    /// signature verification to it
    #[serde(rename = "ProofKey")]
    pub proof_key: EcJsonWebKey,
}

impl UserTokenRequest {
    /// Builds the stage-U body for a ticket and proof key.
    pub fn new(relying_party: &str, site_name: &str, ticket: &str, proof_key: EcJsonWebKey) -> Self {
        Self {
            relying_party: relying_party.to_string(),
            token_type: "JWT".to_string(),
            properties: UserTokenProperties {
                auth_method: "RPS".to_string(),
                site_name: site_name.to_string(),
                rps_ticket: format!("d={ticket}"),
                proof_key,
            },
        }
    }
}

/// Stage-X (relying-party token) request body.
#[derive(Debug, Clone, Serialize)]
pub struct XstsTokenRequest {
    #[serde(rename = "RelyingParty")]
    pub relying_party: String,
    #[serde(rename = "TokenType")]
    pub token_type: String,
    #[serde(rename = "Properties")]
    pub properties: XstsTokenProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct XstsTokenProperties {
    #[serde(rename = "UserTokens")]
    pub user_tokens: Vec<String>,
    #[serde(rename = "SandboxId")]
    pub sandbox_id: String,
}

impl XstsTokenRequest {
    /// Builds the stage-X body for a user token, relying party, and sandbox.
    pub fn new(relying_party: &str, user_token: &str, sandbox_id: &str) -> Self {
        Self {
            relying_party: relying_party.to_string(),
            token_type: "JWT".to_string(),
            properties: XstsTokenProperties {
                user_tokens: vec![user_token.to_string()],
                sandbox_id: sandbox_id.to_string(),
            },
        }
    }
}

/// Stage-U response body.
#[derive(Debug, Clone, Deserialize)]
pub struct UserTokenResponse {
    #[serde(rename = "IssueInstant", default)]
    pub issue_instant: String,
    #[serde(rename = "NotAfter", default)]
    pub not_after: String,
    #[serde(rename = "Token", default)]
    pub token: String,
    #[serde(rename = "DisplayClaims", default)]
    pub display_claims: Option<UserDisplayClaims>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDisplayClaims {
    #[serde(rename = "xui", default)]
    pub users: Vec<UserClaim>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserClaim {
    /// User hash, used to build Authorization header values downstream
    #[serde(rename = "uhs", default)]
    pub user_hash: String,
}

/// Stage-X response body.
#[derive(Debug, Clone, Deserialize)]
pub struct XstsTokenResponse {
    #[serde(rename = "IssueInstant", default)]
    pub issue_instant: String,
    #[serde(rename = "NotAfter", default)]
    pub not_after: String,
    #[serde(rename = "Token", default)]
    pub token: String,
    #[serde(rename = "DisplayClaims", default)]
    pub display_claims: Option<XstsDisplayClaims>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XstsDisplayClaims {
    #[serde(rename = "xui", default)]
    pub users: Vec<XuiClaims>,
}

/// Per-user display claims in a relying-party token.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct XuiClaims {
    #[serde(rename = "agg", default)]
    pub age_group: String,
    #[serde(rename = "gtg", default)]
    pub gamertag: String,
    #[serde(rename = "prv", default)]
    pub privileges: String,
    #[serde(rename = "xid", default)]
    pub xuid: String,
    #[serde(rename = "uhs", default)]
    pub user_hash: String,
    #[serde(rename = "uts", default)]
    pub user_test: String,
}

/// A user-scoped token (stage-U result), bound to the proof key that
/// requested it. Replaced when stale; destroyed on sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken {
    pub token: String,
    pub issue_instant: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    /// `uhs` claim per user entry
    pub user_hashes: Vec<String>,
}

impl UserToken {
    /// Parses the wire response into the domain type.
    ///
    /// An empty `Token` string means the stage failed even if the HTTP call
    /// succeeded.
    pub fn from_response(response: UserTokenResponse) -> Result<Self, BrokerError> {
        if response.token.is_empty() {
            return Err(BrokerError::UserTokenFailed(
                "response carried no token".to_string(),
            ));
        }

        Ok(Self {
            token: response.token,
            issue_instant: parse_instant(&response.issue_instant),
            not_after: parse_instant(&response.not_after),
            user_hashes: response
                .display_claims
                .map(|c| c.users.into_iter().map(|u| u.user_hash).collect())
                .unwrap_or_default(),
        })
    }

    /// True when the token is absent, empty, or past its `NotAfter`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token.is_empty() || self.not_after.map_or(true, |t| t <= now)
    }
}

/// A relying-party-scoped token (stage-X result). One instance per
/// relying-party key in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingPartyToken {
    pub token: String,
    pub issue_instant: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    /// Per-user display claims (age group, gamertag, privileges, xuid, uhs)
    pub display_claims: Vec<XuiClaims>,
}

impl RelyingPartyToken {
    /// Parses the wire response; an empty `Token` surfaces the raw
    /// diagnostic body verbatim through the caller.
    pub fn from_response(
        response: XstsTokenResponse,
        relying_party: &str,
        diagnostic: &str,
    ) -> Result<Self, BrokerError> {
        if response.token.is_empty() {
            return Err(BrokerError::RelyingPartyTokenFailed {
                relying_party: relying_party.to_string(),
                diagnostic: diagnostic.to_string(),
            });
        }

        Ok(Self {
            token: response.token,
            issue_instant: parse_instant(&response.issue_instant),
            not_after: parse_instant(&response.not_after),
            display_claims: response
                .display_claims
                .map(|c| c.users)
                .unwrap_or_default(),
        })
    }

    /// True when the token is empty or past its `NotAfter`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token.is_empty() || self.not_after.map_or(true, |t| t <= now)
    }
}

/// Parses the service's ISO-8601 instants; an unparseable or missing
/// instant is treated as absent (and therefore expired).
fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    text.parse::<DateTime<Utc>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::jwk::EcCurve;

    #[test]
    fn test_user_token_request_wire_shape() {
        let jwk = EcJsonWebKey::from_coordinates(EcCurve::P256, &[1u8; 32], &[2u8; 32]);
        let req = UserTokenRequest::new(
            "http://auth.xboxlive.com",
            "user.auth.xboxlive.com",
            "abc123",
            jwk,
        );
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["RelyingParty"], "http://auth.xboxlive.com");
        assert_eq!(json["TokenType"], "JWT");
        assert_eq!(json["Properties"]["AuthMethod"], "RPS");
        assert_eq!(json["Properties"]["SiteName"], "user.auth.xboxlive.com");
        assert_eq!(json["Properties"]["RpsTicket"], "d=abc123");
        assert_eq!(json["Properties"]["ProofKey"]["kty"], "EC");
    }

    #[test]
    fn test_xsts_request_wire_shape() {
        let req = XstsTokenRequest::new("http://xboxlive.com", "U1", "RETAIL");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["RelyingParty"], "http://xboxlive.com");
        assert_eq!(json["Properties"]["UserTokens"][0], "U1");
        assert_eq!(json["Properties"]["SandboxId"], "RETAIL");
    }

    #[test]
    fn test_response_parses_service_timestamp_format() {
        let json = r#"{
            "IssueInstant": "2024-03-01T10:00:00.1234567Z",
            "NotAfter": "2024-03-01T26:00:00Z",
            "Token": "U1",
            "DisplayClaims": {"xui": [{"uhs": "H1"}]}
        }"#;
        // NotAfter above is deliberately malformed; it parses as absent
        let resp: UserTokenResponse = serde_json::from_str(json).unwrap();
        let token = UserToken::from_response(resp).unwrap();

        assert!(token.issue_instant.is_some());
        assert!(token.not_after.is_none());
        assert_eq!(token.user_hashes, vec!["H1".to_string()]);
    }

    #[test]
    fn test_empty_user_token_is_a_stage_failure() {
        let resp: UserTokenResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            UserToken::from_response(resp),
            Err(BrokerError::UserTokenFailed(_))
        ));
    }

    #[test]
    fn test_empty_xsts_token_surfaces_diagnostic_verbatim() {
        let resp: XstsTokenResponse =
            serde_json::from_str(r#"{"Token": ""}"#).unwrap();
        let err = RelyingPartyToken::from_response(resp, "http://xboxlive.com", "XErr 2148916233")
            .unwrap_err();

        match err {
            BrokerError::RelyingPartyTokenFailed {
                relying_party,
                diagnostic,
            } => {
                assert_eq!(relying_party, "http://xboxlive.com");
                assert_eq!(diagnostic, "XErr 2148916233");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_expiry_uses_not_after() {
        let now = Utc::now();
        let token = RelyingPartyToken {
            token: "X1".to_string(),
            issue_instant: Some(now),
            not_after: Some(now + Duration::hours(4)),
            display_claims: Vec::new(),
        };

        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::hours(4)));
        assert!(token.is_expired(now + Duration::hours(5)));
    }

    #[test]
    fn test_missing_not_after_counts_as_expired() {
        let token = UserToken {
            token: "U1".to_string(),
            issue_instant: None,
            not_after: None,
            user_hashes: Vec::new(),
        };
        assert!(token.is_expired(Utc::now()));
    }

    #[test]
    fn test_xsts_display_claims_parse_all_fields() {
        let json = r#"{
            "Token": "X1",
            "NotAfter": "2030-01-01T00:00:00Z",
            "DisplayClaims": {"xui": [{
                "agg": "Adult",
                "gtg": "Gamer",
                "prv": "192 193",
                "xid": "2535400000000000",
                "uhs": "H1"
            }]}
        }"#;
        let resp: XstsTokenResponse = serde_json::from_str(json).unwrap();
        let token = RelyingPartyToken::from_response(resp, "http://xboxlive.com", "").unwrap();

        let claims = &token.display_claims[0];
        assert_eq!(claims.age_group, "Adult");
        assert_eq!(claims.gamertag, "Gamer");
        assert_eq!(claims.privileges, "192 193");
        assert_eq!(claims.xuid, "2535400000000000");
        assert_eq!(claims.user_hash, "H1");
    }
}
