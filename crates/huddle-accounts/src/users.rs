//! User record repository.

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::Serialize;
use tracing::instrument;

use huddle_core::{Identity, UserId};

use crate::database::Database;
use crate::error::AccountError;

/// A stored user.
#[derive(Clone, Debug, Serialize)]
pub struct UserRow {
    /// Primary key.
    pub id: UserId,
    /// Display name shown in the chat room.
    pub username: String,
    /// Login name; unique.
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip)]
    pub password_hash: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl UserRow {
    /// The identity handed to the relay for this user.
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.username.clone())
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: UserId::new(row.get(0)?),
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

const SELECT_USER: &str = "SELECT id, username, email, password_hash, created_at FROM users";

/// Repository for the `users` table.
#[derive(Clone)]
pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    /// Create a repository over `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new user. Fails with `Conflict` if the email is taken.
    #[instrument(skip(self, password_hash))]
    pub fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRow, AccountError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            let inserted = conn.execute(
                "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![username, email, password_hash, now],
            );

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Err(AccountError::Conflict(format!(
                        "email {email} is already registered"
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            Ok(UserRow {
                id: UserId::new(conn.last_insert_rowid()),
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: now,
            })
        })
    }

    /// Look up a user by login email.
    #[instrument(skip(self))]
    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, AccountError> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(&format!("{SELECT_USER} WHERE email = ?1"), [email], UserRow::from_row)
                .optional()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> UserRepo {
        UserRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn create_user() {
        let repo = repo();
        let user = repo.create("ada", "ada@example.com", "hash").unwrap();
        assert!(user.id.get() > 0);
        assert_eq!(user.username, "ada");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn duplicate_email_conflicts() {
        let repo = repo();
        let _ = repo.create("ada", "ada@example.com", "hash").unwrap();
        let result = repo.create("other ada", "ada@example.com", "hash");
        assert!(matches!(result, Err(AccountError::Conflict(_))));
    }

    #[test]
    fn find_by_email() {
        let repo = repo();
        let created = repo.create("grace", "grace@example.com", "hash").unwrap();
        let found = repo.find_by_email("grace@example.com").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.password_hash, "hash");
    }

    #[test]
    fn find_missing_email_is_none() {
        let repo = repo();
        assert!(repo.find_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn identity_uses_username() {
        let repo = repo();
        let user = repo.create("ada", "ada@example.com", "hash").unwrap();
        let identity = user.identity();
        assert_eq!(identity.id(), user.id);
        assert_eq!(identity.username(), "ada");
    }

    #[test]
    fn password_hash_never_serialized() {
        let repo = repo();
        let user = repo.create("ada", "ada@example.com", "secret-hash").unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
    }
}
