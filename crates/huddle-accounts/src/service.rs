//! Account service facade: registration, login, logout, token lookup.

use serde::Deserialize;
use tracing::{info, instrument, warn};

use huddle_core::{Authenticator, Identity, RelayError};

use crate::database::Database;
use crate::error::AccountError;
use crate::password::{self, MIN_PASSWORD_LEN};
use crate::sessions::{SessionStore, SessionToken};
use crate::users::{UserRepo, UserRow};

const UNKNOWN_EMAIL: &str = "That email does not exist, please try again.";
const WRONG_PASSWORD: &str = "Password incorrect, please try again.";

/// Sign-up form.
#[derive(Clone, Debug, Deserialize)]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), AccountError> {
        if self.name.trim().is_empty() {
            return Err(AccountError::Validation("name is required".into()));
        }
        if self.email.trim().is_empty() {
            return Err(AccountError::Validation("email is required".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Users plus live login sessions.
pub struct AccountService {
    users: UserRepo,
    sessions: SessionStore,
}

impl AccountService {
    /// Create a service backed by `db`.
    pub fn new(db: Database) -> Self {
        Self {
            users: UserRepo::new(db),
            sessions: SessionStore::new(),
        }
    }

    /// Create a user account.
    #[instrument(skip_all, fields(email = %req.email))]
    pub fn register(&self, req: &RegisterRequest) -> Result<UserRow, AccountError> {
        req.validate()?;
        let hash = password::hash_password(&req.password)?;
        let user = self
            .users
            .create(req.name.trim(), req.email.trim(), &hash)?;
        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check credentials and open a session.
    #[instrument(skip_all, fields(email = %email))]
    pub fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Identity, SessionToken), AccountError> {
        let Some(user) = self.users.find_by_email(email.trim())? else {
            warn!("login for unknown email");
            return Err(AccountError::InvalidCredentials(UNKNOWN_EMAIL.into()));
        };

        if !password::verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AccountError::InvalidCredentials(WRONG_PASSWORD.into()));
        }

        let identity = user.identity();
        let token = self.sessions.issue(identity.clone());
        info!(user_id = %user.id, "user logged in");
        Ok((identity, token))
    }

    /// Close a session. Unknown tokens are ignored.
    pub fn logout(&self, token: &SessionToken) {
        if self.sessions.revoke(token) {
            info!("user logged out");
        }
    }

    /// The identity behind a live session, if any.
    pub fn current_user(&self, token: &SessionToken) -> Option<Identity> {
        self.sessions.resolve(token)
    }

    /// Number of live login sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Authenticator for AccountService {
    fn authenticate(&self, token: &str) -> Result<Identity, RelayError> {
        self.current_user(&SessionToken::from_raw(token))
            .ok_or_else(|| RelayError::AuthenticationFailure("no active session".into()))
    }
}
