//! Credential ticket collaborator interface
//!
//! Interactive sign-in lives outside the core behind this trait: the broker
//! never spawns UI. Implementations typically drive a browser-based login
//! and hand back the opaque ticket string, or fail.

use async_trait::async_trait;
use thiserror::Error;

/// Source of credential tickets for the first link of the chain.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Acquires a credential ticket, suspending until the user completes
    /// sign-in or the attempt fails.
    async fn acquire(&self) -> Result<String, TicketError>;

    /// Revokes the current session with the identity provider.
    async fn revoke(&self) -> Result<(), TicketError>;
}

#[derive(Debug, Error)]
pub enum TicketError {
    /// The interactive flow completed without producing a ticket
    #[error("Sign-in failed: {0}")]
    Failed(String),

    /// The user dismissed the flow before completing it
    #[error("Sign-in cancelled")]
    Cancelled,
}
