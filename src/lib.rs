//! # xal-broker — Proof-of-Possession Token Broker
//!
//! Authenticates a client against a multi-tier identity service by chaining
//! three token exchanges, authenticating each outbound request with a
//! detached ECDSA signature bound to a rotating proof key.
//!
//! The chain runs `credential ticket → user token → relying-party token`:
//! the interactive ticket flow lives behind [`TicketSource`], stage U binds
//! the session to the live [`ProofKey`] by embedding its public JWK, and
//! stage X scopes the result to a named relying party. Relying-party tokens
//! are cached with expiry-aware lookups; signing out rotates the proof key
//! and discards every token derived from it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xal_broker::{BrokerConfig, TokenBroker};
//!
//! let broker = TokenBroker::with_http_transport(
//!     BrokerConfig::default(),
//!     Arc::new(my_interactive_ticket_source),
//! )?;
//!
//! let token = broker.get_token("http://xboxlive.com").await?;
//! println!("user hash: {}", token.display_claims[0].user_hash);
//!
//! broker.sign_out().await; // rotates the proof key, drops all tokens
//! ```
//!
//! ## Request signing
//!
//! Every stage call carries a `Signature` header:
//! `base64( BE int32 policy version ‖ BE int64 Windows file time ‖ raw
//! ES256 signature )`, computed over a deterministic canonical byte
//! sequence (see [`signer`]). The remote verifier reconstructs the same
//! bytes from the request and the proof key registered in stage U, so the
//! serialization here must match it bit-for-bit.

pub mod broker;
pub mod cache;
pub mod config;
pub mod contracts;
pub mod error;
pub mod filetime;
pub mod jwk;
pub mod policy;
pub mod proof_key;
pub mod signer;
pub mod signing;
pub mod ticket;
pub mod transport;

pub use broker::TokenBroker;
pub use cache::TokenCache;
pub use config::{BrokerConfig, ConfigError};
pub use contracts::{RelyingPartyToken, UserToken, XuiClaims};
pub use error::{BrokerError, SigningError};
pub use filetime::{is_valid_file_time, Clock, SystemClock, MAX_FILE_TIME};
pub use jwk::{EcCurve, EcJsonWebKey, JwkError};
pub use policy::SignaturePolicy;
pub use proof_key::{ProofKey, ProofKeyError};
pub use signing::SigningContext;
pub use ticket::{TicketError, TicketSource};
pub use transport::{HttpResponse, HttpTransport, Transport, TransportError};
