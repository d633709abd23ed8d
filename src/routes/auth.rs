//! Auth routes: email access codes, cookie sessions and the rider profile.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

use crate::db;
use crate::services::{access_code, auth_session};
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";
const SESSION_DAYS: i64 = 30;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated rider extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub rider: auth_session::SessionRider,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let rider = match auth_session::validate_session(&app_state.pool, token).await {
            Ok(Some(session)) => {
                let rider = session.rider.clone();
                app_state.sessions.remember(token, session);
                rider
            }
            Ok(None) => {
                app_state.sessions.forget(token);
                return Err(StatusCode::UNAUTHORIZED);
            }
            Err(e) if db::is_unavailable(&e) => {
                tracing::warn!(error = %e, "database unreachable; using cached session");
                app_state
                    .sessions
                    .lookup(token, OffsetDateTime::now_utc())
                    .ok_or(StatusCode::SERVICE_UNAVAILABLE)?
            }
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        Ok(Self { rider, token: token.to_owned() })
    }
}

fn session_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub(crate) fn access_code_error_to_status(err: &access_code::AccessCodeError) -> StatusCode {
    match err {
        access_code::AccessCodeError::InvalidEmail | access_code::AccessCodeError::InvalidCode => {
            StatusCode::BAD_REQUEST
        }
        access_code::AccessCodeError::VerificationFailed => StatusCode::UNAUTHORIZED,
        access_code::AccessCodeError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
        access_code::AccessCodeError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub email: String,
}

/// `POST /api/auth/request-code`: mail a one-time access code.
pub async fn request_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<StatusCode, StatusCode> {
    let result = async {
        let (email, code) = access_code::request_access_code(&state.pool, &body.email).await?;
        access_code::deliver_access_code(state.config.mail.as_ref(), &email, &code).await
    }
    .await;

    match result {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::warn!(error = %e, "access code request failed");
            Err(access_code_error_to_status(&e))
        }
    }
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

/// `POST /api/auth/verify-code`: trade a code for a session cookie.
pub async fn verify_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, StatusCode> {
    let rider_id = access_code::verify_access_code(&state.pool, &body.email, &body.code)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "access code verification failed");
            access_code_error_to_status(&e)
        })?;

    let token = auth_session::create_session(&state.pool, rider_id).await.map_err(|e| {
        tracing::error!(error = %e, "session creation failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let session = auth_session::validate_session(&state.pool, &token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    let rider = session.rider.clone();
    state.sessions.remember(&token, session);

    let jar = jar.add(session_cookie(token, state.config.cookie_secure, Duration::days(SESSION_DAYS)));
    Ok((jar, Json(rider)))
}

/// `GET /api/auth/me`: return the current rider.
pub async fn me(auth: AuthUser) -> Json<auth_session::SessionRider> {
    Json(auth.rider)
}

/// `POST /api/auth/logout`: delete the session and clear the cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    state.sessions.forget(&auth.token);
    if let Err(e) = auth_session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }
    let jar = CookieJar::new().add(session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO));
    (jar, StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ProfileBody {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// `PUT /api/auth/profile`: update display name and avatar.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileBody>,
) -> Result<Json<auth_session::SessionRider>, StatusCode> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    auth_session::update_profile(&state.pool, auth.rider.id, Some(name), body.avatar_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "profile update failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let session = auth_session::validate_session(&state.pool, &auth.token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let rider = session.rider.clone();
    state.sessions.remember(&auth.token, session);
    Ok(Json(rider))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
