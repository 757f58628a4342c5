//! `GET /ws`: authenticate, upgrade, hand off to the session loop.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use tracing::{debug, warn};

use huddle_core::RelayError;
use huddle_core::constants::SESSION_COOKIE;

use super::session::run_ws_session;
use crate::error::ApiError;
use crate::server::AppState;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Upgrade request received, identity not yet checked.
    Unauthenticated,
    /// Identity accepted, handshake in progress.
    Upgrading,
    /// Registered and relaying.
    Live,
    /// Terminal.
    Closed,
}

impl SessionPhase {
    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Unauthenticated, Self::Upgrading)
                | (Self::Upgrading, Self::Live | Self::Closed)
                | (Self::Live, Self::Closed)
        )
    }

    /// Move to `next`.
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        debug_assert!(
            self.can_advance_to(next),
            "illegal session transition {self:?} -> {next:?}"
        );
        next
    }
}

/// Query string accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Session token, for clients that cannot set cookies or headers.
    pub token: Option<String>,
}

/// Pull the session token from the cookie, bearer header, or query string,
/// in that order.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap, params: &WsParams) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_owned());
    }
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }
    params.token.clone().filter(|t| !t.is_empty())
}

/// GET /ws
pub async fn ws_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    params: Result<Query<WsParams>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let phase = SessionPhase::Unauthenticated;
    // An unreadable query string carries no token.
    let params = params.map(|Query(p)| p).unwrap_or_default();

    let token = session_token(&jar, &headers, &params)
        .ok_or_else(|| RelayError::AuthenticationFailure("no session token".into()))?;
    let identity = state.authenticator.authenticate(&token).inspect_err(|e| {
        debug!(error = %e, "rejecting upgrade");
    })?;

    let _phase = phase.advance(SessionPhase::Upgrading);
    let upgrade = upgrade.map_err(|rejection| ApiError::Upgrade {
        status: rejection.status(),
        source: RelayError::UpgradeFailure(rejection.body_text()),
    })?;

    let ctx = state.session_context();
    Ok(upgrade
        .max_message_size(state.config.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_ws_session(socket, identity, ctx)))
}
