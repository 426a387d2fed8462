//! Token exchange chain
//!
//! Drives the three-stage chain `NoTicket → HasTicket → HasUserToken →
//! HasRelyingPartyToken[party]` behind a single entry point,
//! [`TokenBroker::get_token`]. Each outbound stage call is authenticated
//! with a detached signature bound to the live proof key; the key is
//! rotated on sign-out, which invalidates every token derived from it.
//!
//! All broker state sits behind one async mutex: at most one exchange is in
//! flight per broker, and a caller arriving mid-exchange suspends until the
//! first completes (usually landing on the freshly cached token).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::TokenCache;
use crate::config::BrokerConfig;
use crate::contracts::{
    RelyingPartyToken, UserToken, UserTokenRequest, UserTokenResponse, XstsTokenRequest,
    XstsTokenResponse,
};
use crate::error::BrokerError;
use crate::filetime::{file_time_from_system, Clock, SystemClock};
use crate::jwk::EcJsonWebKey;
use crate::policy::SignaturePolicy;
use crate::proof_key::ProofKey;
use crate::signer;
use crate::ticket::TicketSource;
use crate::transport::{HttpResponse, HttpTransport, Transport, TransportError};

/// Header carrying the detached request signature.
const SIGNATURE_HEADER: &str = "Signature";

/// Header naming the service contract version for each stage.
const CONTRACT_VERSION_HEADER: &str = "x-xbl-contract-version";

/// Mutable session state, guarded by the broker's mutex.
struct BrokerState {
    /// The live proof key. Replaced wholesale on rotation (swap-then-publish);
    /// never mutated in place.
    proof_key: Arc<ProofKey>,
    ticket: Option<String>,
    user_token: Option<UserToken>,
    cache: TokenCache,
}

/// Proof-of-possession token broker for one logical identity session.
pub struct TokenBroker {
    config: BrokerConfig,
    ticket_source: Arc<dyn TicketSource>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    state: Mutex<BrokerState>,
}

impl TokenBroker {
    /// Creates a broker with the system clock. A fresh proof key is
    /// generated at construction.
    pub fn new(
        config: BrokerConfig,
        ticket_source: Arc<dyn TicketSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_clock(config, ticket_source, transport, Arc::new(SystemClock))
    }

    /// Creates a broker over the production HTTP transport, using the
    /// configured request timeout.
    pub fn with_http_transport(
        config: BrokerConfig,
        ticket_source: Arc<dyn TicketSource>,
    ) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout)?);
        Ok(Self::new(config, ticket_source, transport))
    }

    /// Creates a broker with an injected clock, for expiry-sensitive tests.
    pub fn with_clock(
        config: BrokerConfig,
        ticket_source: Arc<dyn TicketSource>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            ticket_source,
            transport,
            clock,
            state: Mutex::new(BrokerState {
                proof_key: Arc::new(ProofKey::generate()),
                ticket: None,
                user_token: None,
                cache: TokenCache::new(),
            }),
        }
    }

    /// Returns a token scoped to `relying_party`, walking the exchange
    /// chain as far as needed.
    ///
    /// A fresh cached token is returned without any network call. On a
    /// miss the broker ensures a credential ticket, ensures a valid user
    /// token (stage U), exchanges it for the relying-party token (stage X),
    /// caches the result, and returns it. On any stage failure the cached
    /// state is left exactly as it was before the attempt.
    pub async fn get_token(&self, relying_party: &str) -> Result<RelyingPartyToken, BrokerError> {
        if relying_party.is_empty() {
            return Err(BrokerError::InvalidArgument(
                "a relying party must be specified",
            ));
        }

        let mut state = self.state.lock().await;
        let now = self.now_utc();

        if let Some(token) = state.cache.get_fresh(relying_party, now) {
            debug!(relying_party, "relying-party token served from cache");
            return Ok(token.clone());
        }

        self.ensure_ticket(&mut state).await?;
        self.ensure_user_token(&mut state, now).await?;

        let token = self.exchange_relying_party_token(&state, relying_party).await?;
        state.cache.insert(relying_party.to_string(), token.clone());
        info!(relying_party, "relying-party token issued and cached");
        Ok(token)
    }

    /// Returns a token for the configured default relying party.
    pub async fn get_default_token(&self) -> Result<RelyingPartyToken, BrokerError> {
        let relying_party = self.config.default_relying_party.clone();
        self.get_token(&relying_party).await
    }

    /// True when a fresh token for the default relying party is cached.
    pub async fn is_signed_in(&self) -> bool {
        let mut state = self.state.lock().await;
        let now = self.now_utc();
        let relying_party = self.config.default_relying_party.clone();
        state.cache.get_fresh(&relying_party, now).is_some()
    }

    /// The live proof key's public JWK.
    pub async fn proof_key_jwk(&self) -> EcJsonWebKey {
        self.state.lock().await.proof_key.public_jwk()
    }

    /// Discards the ticket, the user token, and every cached relying-party
    /// token, then rotates the proof key and revokes the ticket session.
    ///
    /// Rotation invalidates every token derived from the old key even if
    /// its `NotAfter` has not passed; the next `get_token` call starts the
    /// chain from scratch.
    pub async fn sign_out(&self) {
        {
            let mut state = self.state.lock().await;
            state.ticket = None;
            state.user_token = None;
            state.cache.clear();

            // Build the replacement fully before installing it, so no
            // reader ever observes a partially rotated key.
            let fresh = Arc::new(ProofKey::generate());
            state.proof_key = fresh;
            info!("signed out: token state discarded, proof key rotated");
        }

        if let Err(e) = self.ticket_source.revoke().await {
            warn!(error = %e, "ticket revocation failed");
        }
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().into()
    }

    /// Acquires a credential ticket if none is held.
    async fn ensure_ticket(&self, state: &mut BrokerState) -> Result<(), BrokerError> {
        if state.ticket.as_deref().is_some_and(|t| !t.is_empty()) {
            return Ok(());
        }

        debug!("acquiring credential ticket");
        let acquired = timeout(self.config.request_timeout, self.ticket_source.acquire()).await;

        let ticket = match acquired {
            Err(_) => {
                return Err(BrokerError::NetworkOrTimeout(
                    "ticket acquisition timed out".to_string(),
                ))
            }
            Ok(Err(e)) => {
                warn!(error = %e, "ticket acquisition failed");
                return Err(BrokerError::TicketAcquisitionFailed(e.to_string()));
            }
            Ok(Ok(t)) => t,
        };

        if ticket.is_empty() {
            return Err(BrokerError::TicketAcquisitionFailed(
                "collaborator returned an empty ticket".to_string(),
            ));
        }

        state.ticket = Some(ticket);
        Ok(())
    }

    /// Performs stage U if no valid user token is held.
    ///
    /// The request carries the ticket and the proof key's public JWK so
    /// the service binds the issued token to this key.
    async fn ensure_user_token(
        &self,
        state: &mut BrokerState,
        now: DateTime<Utc>,
    ) -> Result<(), BrokerError> {
        if state.user_token.as_ref().is_some_and(|t| !t.is_expired(now)) {
            return Ok(());
        }

        let ticket = state.ticket.as_deref().ok_or_else(|| {
            BrokerError::TicketAcquisitionFailed("no credential ticket held".to_string())
        })?;

        debug!("requesting user token");
        let request = UserTokenRequest::new(
            &self.config.auth_relying_party,
            &self.config.site_name,
            ticket,
            state.proof_key.public_jwk(),
        );
        let body = encode_body(&request).map_err(BrokerError::UserTokenFailed)?;

        let headers = vec![(
            CONTRACT_VERSION_HEADER.to_string(),
            self.config.user_token_contract_version.clone(),
        )];
        let response = self
            .post_signed(
                &self.config.user_token_url,
                &SignaturePolicy::user_token(),
                &headers,
                &body,
                &state.proof_key,
            )
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "user token endpoint rejected the request");
            return Err(BrokerError::UserTokenFailed(response.body));
        }

        let parsed: UserTokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| BrokerError::UserTokenFailed(format!("unparseable response: {e}")))?;
        let token = UserToken::from_response(parsed)?;

        info!("user token issued");
        state.user_token = Some(token);
        Ok(())
    }

    /// Performs stage X: exchanges the held user token for a token scoped
    /// to `relying_party`.
    async fn exchange_relying_party_token(
        &self,
        state: &BrokerState,
        relying_party: &str,
    ) -> Result<RelyingPartyToken, BrokerError> {
        let user_token = state.user_token.as_ref().ok_or_else(|| {
            BrokerError::UserTokenFailed("no user token held".to_string())
        })?;

        debug!(relying_party, "requesting relying-party token");
        let request =
            XstsTokenRequest::new(relying_party, &user_token.token, &self.config.sandbox_id);
        let body = encode_body(&request).map_err(|diagnostic| {
            BrokerError::RelyingPartyTokenFailed {
                relying_party: relying_party.to_string(),
                diagnostic,
            }
        })?;

        let headers = vec![(
            CONTRACT_VERSION_HEADER.to_string(),
            self.config.xsts_contract_version.clone(),
        )];
        let response = self
            .post_signed(
                &self.config.xsts_url,
                &SignaturePolicy::relying_party_token(),
                &headers,
                &body,
                &state.proof_key,
            )
            .await?;

        if !response.is_success() {
            warn!(
                relying_party,
                status = response.status,
                "relying-party token endpoint rejected the request"
            );
            // The remote diagnostic text is surfaced verbatim
            return Err(BrokerError::RelyingPartyTokenFailed {
                relying_party: relying_party.to_string(),
                diagnostic: response.body,
            });
        }

        let parsed: XstsTokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            BrokerError::RelyingPartyTokenFailed {
                relying_party: relying_party.to_string(),
                diagnostic: format!("unparseable response: {e}"),
            }
        })?;

        RelyingPartyToken::from_response(parsed, relying_party, &response.body)
    }

    /// Signs the request with the live proof key and POSTs it, bounded by
    /// the configured timeout. A timeout or transport failure leaves all
    /// cached state untouched.
    async fn post_signed(
        &self,
        url: &Url,
        policy: &SignaturePolicy,
        headers: &[(String, String)],
        body: &[u8],
        proof_key: &ProofKey,
    ) -> Result<HttpResponse, BrokerError> {
        let timestamp = file_time_from_system(self.clock.now())?;
        let signature = signer::signature_for_request(
            proof_key,
            policy,
            timestamp,
            "POST",
            &path_and_query(url),
            headers,
            body,
        )?;

        let mut sent = headers.to_vec();
        sent.push((SIGNATURE_HEADER.to_string(), signature));

        match timeout(
            self.config.request_timeout,
            self.transport.post_json(url, &sent, body),
        )
        .await
        {
            Err(_) => Err(BrokerError::NetworkOrTimeout(format!(
                "request to {url} timed out"
            ))),
            Ok(Err(e)) => Err(BrokerError::NetworkOrTimeout(e.to_string())),
            Ok(Ok(response)) => Ok(response),
        }
    }
}

/// Serializes a request body, mapping the (practically unreachable)
/// failure into a stage diagnostic.
fn encode_body<T: Serialize>(request: &T) -> Result<Vec<u8>, String> {
    serde_json::to_vec(request).map_err(|e| format!("failed to encode request body: {e}"))
}

/// The path-and-query component exactly as it appears in the request URI,
/// percent-encoding preserved.
fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
