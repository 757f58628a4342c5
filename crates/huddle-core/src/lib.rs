//! # huddle-core
//!
//! Shared vocabulary for the Huddle chat relay.
//!
//! - **Branded IDs**: `ConnectionId`, `UserId` newtypes
//! - **Identity**: the immutable `{id, username}` value handed to the relay
//!   by the account service
//! - **Errors**: [`RelayError`] taxonomy via `thiserror`
//! - **Auth contract**: the [`Authenticator`] trait the gateway consumes
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod auth;
pub mod constants;
pub mod errors;
pub mod identity;
pub mod ids;
pub mod logging;

pub use auth::Authenticator;
pub use constants::CONNECTED_SENTINEL;
pub use errors::RelayError;
pub use identity::Identity;
pub use ids::{ConnectionId, UserId};
