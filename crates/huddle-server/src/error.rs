//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use huddle_accounts::AccountError;
use huddle_core::RelayError;

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Account service failure.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Relay failure.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// Rejected WebSocket handshake, keeping the rejection's status.
    #[error("{source}")]
    Upgrade {
        /// Status chosen by the upgrade extractor.
        status: StatusCode,
        /// The `UpgradeFailure`.
        source: RelayError,
    },

    /// Something unexpected (e.g. a panicked blocking task).
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    /// Status code and `error` kind for the response body.
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Account(e) => match e {
                AccountError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
                AccountError::InvalidCredentials(_) => {
                    (StatusCode::UNAUTHORIZED, "invalid_credentials")
                }
                AccountError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                AccountError::Database(_) | AccountError::Hashing(_) | AccountError::Io(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                }
            },
            Self::Relay(e) => {
                let status = match e {
                    RelayError::AuthenticationFailure(_) => StatusCode::UNAUTHORIZED,
                    RelayError::UpgradeFailure(_) => StatusCode::BAD_REQUEST,
                    RelayError::ConnectionClosed(_) => StatusCode::GONE,
                    RelayError::DuplicateConnection(_) | RelayError::DeliveryFailure { .. } => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.error_kind())
            }
            Self::Upgrade { status, source } => (*status, source.error_kind()),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error: kind, message })).into_response()
    }
}
