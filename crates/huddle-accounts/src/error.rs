//! Account service errors.

/// Errors raised by the account service.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// `SQLite` failure.
    #[error("database error: {0}")]
    Database(String),

    /// Unique constraint hit (e.g. email already registered).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Form input rejected before touching storage.
    #[error("{0}")]
    Validation(String),

    /// Unknown email or wrong password. The message is shown to the user.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Password hashing or hash parsing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),

    /// Filesystem failure while opening the database.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for AccountError {
    fn from(e: rusqlite::Error) -> Self {
        AccountError::Database(e.to_string())
    }
}
