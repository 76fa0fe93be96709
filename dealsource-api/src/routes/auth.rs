/// Authentication endpoints
///
/// - `POST /api/auth/login` - check credentials, issue a session
/// - `POST /api/auth/logout` - clear the session cookie
/// - `GET  /api/auth/session` - current session (requires a session)
/// - `POST /api/auth/forgot-password` - email a reset link
/// - `POST /api/auth/reset-password` - set a new password with that link
///
/// Sessions are signed tokens returned in the body and also set as the
/// `dealsource.session-token` HTTP-only cookie for browser clients.

use crate::{
    app::AppState,
    config::Config,
    error::ApiResult,
    extract::ValidatedJson,
};
use axum::{extract::State, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, TimeZone, Utc};
use dealsource_shared::{
    auth::{
        credentials::authenticate,
        reset::{complete_reset, request_reset},
        session::{create_token, Claims, SESSION_COOKIE},
    },
    models::user::{User, UserRole},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Same body for every forgot-password outcome
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

pub const RESET_PASSWORD_MESSAGE: &str = "Your password has been reset. You can now sign in.";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub token: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.api.production)
        .max_age(time::Duration::days(config.session.max_age_days))
        .build()
}

fn expiry(claims: &Claims) -> DateTime<Utc> {
    Utc.timestamp_opt(claims.exp, 0).single().unwrap_or_else(Utc::now)
}

/// Login endpoint
///
/// ```text
/// POST /api/auth/login
/// { "email": "sam@example.com", "password": "..." }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: validation failed
/// - `401 Unauthorized`: unknown email or wrong password
/// - `403 Forbidden`: account deactivated
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let user = authenticate(&state.db, &req.email, &req.password).await?;

    let claims = Claims::for_user(&user, state.config.session.max_age());
    let token = create_token(&claims, state.session_secret())?;

    let jar = jar.add(session_cookie(token.clone(), &state.config));

    Ok((
        jar,
        Json(LoginResponse {
            token,
            expires_at: expiry(&claims),
            user,
        }),
    ))
}

/// Overwrites the session cookie with an expired one; always succeeds
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let mut cookie = session_cookie(String::new(), &state.config);
    cookie.set_max_age(time::Duration::ZERO);
    let jar = jar.add(cookie);

    (
        jar,
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    )
}

pub async fn session(Extension(claims): Extension<Claims>) -> Json<SessionResponse> {
    Json(SessionResponse {
        expires_at: expiry(&claims),
        user: SessionUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        },
    })
}

/// Starts a password reset
///
/// Answers with the same `200` body whether or not the email belongs to an
/// account. Only an invalid request body gets a different answer (`400`).
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Json<MessageResponse> {
    if let Err(e) = request_reset(
        &state.db,
        state.mailer.as_ref(),
        &state.config.api.base_url,
        &req.email,
    )
    .await
    {
        tracing::error!(error = %e, "Password reset request failed");
    }

    Json(MessageResponse {
        message: FORGOT_PASSWORD_MESSAGE.to_string(),
    })
}

/// Completes a password reset
///
/// # Errors
///
/// - `400 Bad Request`: weak password, or unknown / expired / used token
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    complete_reset(&state.db, &req.token, &req.password).await?;

    Ok(Json(MessageResponse {
        message: RESET_PASSWORD_MESSAGE.to_string(),
    }))
}
