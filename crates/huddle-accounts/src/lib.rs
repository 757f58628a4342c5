//! # huddle-accounts
//!
//! The account service behind the chat relay: user records in `SQLite`,
//! Argon2id password hashing, and in-memory session tokens.
//!
//! The relay itself only sees [`AccountService`] through the
//! [`huddle_core::Authenticator`] contract.

#![deny(unsafe_code)]

pub mod database;
pub mod error;
pub mod password;
pub mod schema;
pub mod service;
pub mod sessions;
pub mod users;

pub use database::Database;
pub use error::AccountError;
pub use service::{AccountService, RegisterRequest};
pub use sessions::SessionToken;
pub use users::{UserRepo, UserRow};
