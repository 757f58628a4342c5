//! The authentication contract consumed by the session gateway.

use crate::errors::RelayError;
use crate::identity::Identity;

/// Resolves an opaque session token into the identity it was issued for.
///
/// Implementations must return [`RelayError::AuthenticationFailure`] for
/// missing, unknown, or revoked tokens.
pub trait Authenticator: Send + Sync {
    /// Resolve `token` to an identity.
    fn authenticate(&self, token: &str) -> Result<Identity, RelayError>;
}
