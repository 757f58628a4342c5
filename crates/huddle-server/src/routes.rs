//! HTTP routes: account API, health, metrics, and the `/ws` gateway.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use huddle_accounts::{AccountError, RegisterRequest, SessionToken};
use huddle_core::constants::SESSION_COOKIE;
use huddle_core::{Identity, RelayError, UserId};

use crate::error::ApiError;
use crate::health::{self, HealthResponse};
use crate::server::AppState;
use crate::websocket::gateway::{WsParams, session_token, ws_handler};

/// Build the application router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/me", get(me))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a blocking account-store call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AccountError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

#[derive(Serialize)]
struct RegisterResponse {
    id: UserId,
    username: String,
}

/// POST /api/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let accounts = state.accounts.clone();
    let user = blocking(move || accounts.register(&req)).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
        }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    username: String,
    token: String,
}

/// POST /api/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let accounts = state.accounts.clone();
    let (identity, token) = blocking(move || accounts.login(&req.email, &req.password)).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token.as_str().to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            username: identity.username().to_owned(),
            token: token.as_str().to_owned(),
        }),
    ))
}

/// POST /api/logout
async fn logout(State(state): State<AppState>, jar: CookieJar, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&jar, &headers, &WsParams::default()) {
        state.accounts.logout(&SessionToken::from_raw(token));
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT).into_response()
}

/// GET /api/me
async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<Identity>, ApiError> {
    let token = session_token(&jar, &headers, &WsParams::default())
        .ok_or_else(|| RelayError::AuthenticationFailure("not logged in".into()))?;
    Ok(Json(state.authenticator.authenticate(&token)?))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.len(),
        state.accounts.session_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
    use axum::http::Request;
    use huddle_accounts::{AccountService, Database};
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::server::HuddleServer;

    use super::*;

    fn make_server() -> HuddleServer {
        let accounts = Arc::new(AccountService::new(Database::in_memory().unwrap()));
        HuddleServer::new(ServerConfig::default(), accounts)
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn signup(app: &Router, name: &str, email: &str) -> Response {
        let body = serde_json::json!({"name": name, "email": email, "password": "correct horse"});
        app.clone().oneshot(post_json("/api/register", &body)).await.unwrap()
    }

    async fn signin(app: &Router, email: &str, password: &str) -> Response {
        let body = serde_json::json!({"email": email, "password": password});
        app.clone().oneshot(post_json("/api/login", &body)).await.unwrap()
    }

    #[tokio::test]
    async fn register_returns_created() {
        let app = make_server().router();
        let resp = signup(&app, "Ada", "ada@example.com").await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json_body(resp).await;
        assert_eq!(body["username"], "Ada");
        assert!(body["id"].is_number());
    }

    #[tokio::test]
    async fn register_duplicate_email_is_conflict() {
        let app = make_server().router();
        let _ = signup(&app, "Ada", "ada@example.com").await;
        let resp = signup(&app, "Other", "ada@example.com").await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(resp).await["error"], "conflict");
    }

    #[tokio::test]
    async fn register_short_password_is_bad_request() {
        let app = make_server().router();
        let body = serde_json::json!({"name": "Ada", "email": "ada@example.com", "password": "short"});
        let resp = app.oneshot(post_json("/api/register", &body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let app = make_server().router();
        let _ = signup(&app, "Ada", "ada@example.com").await;
        let resp = signin(&app, "ada@example.com", "correct horse").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let cookie = resp.headers()[SET_COOKIE].to_str().unwrap().to_owned();
        assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));

        let body = json_body(resp).await;
        assert_eq!(body["username"], "Ada");
        assert!(cookie.contains(body["token"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn login_wrong_password_message() {
        let app = make_server().router();
        let _ = signup(&app, "Ada", "ada@example.com").await;
        let resp = signin(&app, "ada@example.com", "wrong horse").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["message"], "Password incorrect, please try again.");
    }

    #[tokio::test]
    async fn login_unknown_email_message() {
        let app = make_server().router();
        let resp = signin(&app, "ghost@example.com", "whatever1").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(resp).await["message"],
            "That email does not exist, please try again."
        );
    }

    #[tokio::test]
    async fn me_requires_session() {
        let app = make_server().router();
        let req = Request::builder().uri("/api/me").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_with_cookie_then_logout() {
        let app = make_server().router();
        let _ = signup(&app, "Ada", "ada@example.com").await;
        let token = json_body(signin(&app, "ada@example.com", "correct horse").await).await["token"]
            .as_str()
            .unwrap()
            .to_owned();
        let cookie = format!("{SESSION_COOKIE}={token}");

        let req = Request::builder()
            .uri("/api/me")
            .header(COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["username"], "Ada");

        let req = Request::builder()
            .method("POST")
            .uri("/api/logout")
            .header(COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = Request::builder()
            .uri("/api/me")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_without_session_is_unauthorized() {
        let app = make_server().router();
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"], "authentication_failure");
    }

    #[tokio::test]
    async fn ws_with_forged_token_is_unauthorized() {
        let app = make_server().router();
        let req = Request::builder().uri("/ws?token=forged").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ws_with_unreadable_query_is_unauthorized() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/ws?token=a&token=b")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"], "authentication_failure");
    }

    #[tokio::test]
    async fn ws_unreadable_query_falls_back_to_cookie() {
        let app = make_server().router();
        let _ = signup(&app, "Ada", "ada@example.com").await;
        let token = json_body(signin(&app, "ada@example.com", "correct horse").await).await["token"]
            .as_str()
            .unwrap()
            .to_owned();

        let req = Request::builder()
            .uri("/ws?token=a&token=b")
            .header(COOKIE, format!("{SESSION_COOKIE}={token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(json_body(resp).await["error"], "upgrade_failure");
    }

    #[tokio::test]
    async fn ws_plain_get_with_session_is_upgrade_failure() {
        let app = make_server().router();
        let _ = signup(&app, "Ada", "ada@example.com").await;
        let token = json_body(signin(&app, "ada@example.com", "correct horse").await).await["token"]
            .as_str()
            .unwrap()
            .to_owned();

        let req = Request::builder()
            .uri("/ws")
            .header(COOKIE, format!("{SESSION_COOKIE}={token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
        assert_eq!(json_body(resp).await["error"], "upgrade_failure");
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let app = make_server().router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_not_found() {
        let app = make_server().router();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
