//! Wire-level constants shared by clients and the relay.

/// Join announcement a client sends once its channel is open.
///
/// Never broadcast. Existing clients depend on this exact string.
pub const CONNECTED_SENTINEL: &str = "User connected!";

/// Cookie carrying the session token issued at login.
pub const SESSION_COOKIE: &str = "huddle_session";
