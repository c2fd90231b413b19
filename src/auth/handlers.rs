use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{
            CreateAccountRequest, LoginRequest, LoginStatusResponse, Outcome, PublicUser,
            ResetPasswordRequest, SetPasswordRequest,
        },
        service::AuthError,
    },
    sessions::{clear_session_cookie, session_cookie, SessionId},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/loginStatus", get(login_status))
        .route("/logout", get(logout))
        .route("/create-account", post(create_account))
        .route("/reset-password", post(reset_password))
        .route("/set-password", post(set_password))
}

/// Every outcome, including failure, is a 200 with a body-level field;
/// this mirrors the API contract the frontend was built against.
fn reply(result: Result<Outcome, AuthError>) -> Json<Outcome> {
    match result {
        Ok(outcome) => Json(outcome),
        Err(e) => {
            if let AuthError::Internal(ref inner) = e {
                error!(error = %inner, "auth operation failed");
            }
            Json(Outcome::error(e.user_message()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> (HeaderMap, Json<Outcome>) {
    let mut headers = HeaderMap::new();
    let body = match state.auth.login(&payload.username, &payload.password).await {
        Ok((session_id, _user)) => {
            let ttl_secs = state.config.session_ttl_days * 24 * 60 * 60;
            headers.insert(
                SET_COOKIE,
                session_cookie(session_id, ttl_secs).parse().unwrap(),
            );
            Json(Outcome::success("open sesame!"))
        }
        Err(e) => reply(Err(e)),
    };
    (headers, body)
}

#[instrument(skip(state))]
pub async fn login_status(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> Json<LoginStatusResponse> {
    let user = state.auth.login_status(session_id).await;
    Json(LoginStatusResponse {
        is_logged_in: user.is_some(),
        user: user.map(PublicUser::from),
    })
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    SessionId(session_id): SessionId,
) -> (HeaderMap, Json<LoginStatusResponse>) {
    state.auth.logout(session_id).await;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie().parse().unwrap());
    (
        headers,
        Json(LoginStatusResponse {
            is_logged_in: false,
            user: None,
        }),
    )
}

#[instrument(skip(state, payload))]
pub async fn create_account(
    State(state): State<AppState>,
    Json(mut payload): Json<CreateAccountRequest>,
) -> Json<Outcome> {
    payload.email_address = payload.email_address.trim().to_lowercase();
    if !is_valid_email(&payload.email_address) {
        warn!(email = %payload.email_address, "invalid email");
        return Json(Outcome::error("invalid email address"));
    }

    reply(
        state
            .auth
            .create_account(&payload.username, &payload.password, &payload.email_address)
            .await
            .map(|_| Outcome::success("account created")),
    )
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetPasswordRequest>,
) -> Json<Outcome> {
    payload.email_address = payload.email_address.trim().to_lowercase();
    reply(
        state
            .auth
            .request_password_reset(&payload.email_address)
            .await
            .map(|()| Outcome::message("password reset email sent, check your inbox")),
    )
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    Json(payload): Json<SetPasswordRequest>,
) -> Json<Outcome> {
    reply(
        state
            .auth
            .redeem_password_reset(&payload.reset_token, &payload.password)
            .await
            .map(|()| Outcome::success("password updated")),
    )
}
