//! Relying-party token cache
//!
//! Keyed by relying-party identifier. Every lookup checks `NotAfter`
//! against the supplied clock; an expired entry is treated as absent and
//! removed, which triggers exactly one re-exchange upstream. The whole map
//! is dropped on sign-out or proof-key rotation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::contracts::RelyingPartyToken;

/// In-memory store of relying-party tokens with lazy expiry.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: HashMap<String, RelyingPartyToken>,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Returns the cached token for a relying party if it is fresh at
    /// `now`. An expired or empty entry is removed and `None` returned.
    pub fn get_fresh(&mut self, relying_party: &str, now: DateTime<Utc>) -> Option<&RelyingPartyToken> {
        let stale = self
            .entries
            .get(relying_party)
            .map(|t| t.is_expired(now))
            .unwrap_or(false);

        if stale {
            debug!(relying_party, "evicting expired relying-party token");
            self.entries.remove(relying_party);
        }

        self.entries.get(relying_party)
    }

    /// Stores a token under its relying-party key, replacing any previous
    /// entry.
    pub fn insert(&mut self, relying_party: String, token: RelyingPartyToken) {
        self.entries.insert(relying_party, token);
    }

    /// Drops every entry. Used on sign-out and key rotation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
