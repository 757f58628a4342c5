//! Opaque session tokens issued at login.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::RngCore;

use huddle_core::Identity;

/// A 256-bit random bearer token, base64url encoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wrap a token received from a client.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The encoded token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// In-memory map of live session tokens to identities.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionToken, Identity>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new token for `identity`.
    pub fn issue(&self, identity: Identity) -> SessionToken {
        let token = SessionToken::generate();
        let _ = self.sessions.insert(token.clone(), identity);
        token
    }

    /// Resolve a token to its identity.
    pub fn resolve(&self, token: &SessionToken) -> Option<Identity> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    /// Revoke a token. Returns `false` if it was not live.
    pub fn revoke(&self, token: &SessionToken) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Number of live tokens.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no tokens are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
