/// Session middleware for axum
///
/// Reads the session token from `Authorization: Bearer <token>` or, for
/// browser clients, from the `dealsource.session-token` cookie. On success the
/// decoded [`Claims`] are inserted into the request extensions so handlers can
/// take `Extension<Claims>`.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware, Extension};
/// use dealsource_shared::auth::middleware::create_session_middleware;
/// use dealsource_shared::auth::session::Claims;
///
/// async fn me(Extension(claims): Extension<Claims>) -> String {
///     claims.email
/// }
///
/// let app: Router = Router::new()
///     .route("/api/auth/session", get(me))
///     .layer(middleware::from_fn(create_session_middleware("secret")));
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use super::session::{validate_token, Claims, SessionError, SESSION_COOKIE};

/// Rejection produced when a request has no usable session
#[derive(Debug)]
pub enum AuthError {
    MissingCredentials,
    InvalidFormat(String),
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string())
            }
            AuthError::InvalidFormat(msg) => (StatusCode::UNAUTHORIZED, msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let body = Json(json!({
            "error": "unauthorized",
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Finds the raw session token, preferring the Authorization header
///
/// A present but non-Bearer Authorization header is an error rather than a
/// reason to fall back to the cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidFormat("Malformed Authorization header".to_string()))?;

        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

        return Ok(Some(token.trim().to_string()));
    }

    let jar = CookieJar::from_headers(headers);
    Ok(jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty()))
}

/// Decodes the session if one is present and valid
///
/// Used by the page gate, which treats a bad token the same as no session.
pub fn session_from_headers(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let token = token_from_headers(headers).ok().flatten()?;
    validate_token(&token, secret).ok()
}

/// Rejects requests without a valid session with `401`
pub async fn session_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = token_from_headers(req.headers())?.ok_or(AuthError::MissingCredentials)?;

    let claims = validate_token(&token, &secret).map_err(|e| match e {
        SessionError::Expired => AuthError::InvalidToken("Session expired".to_string()),
        _ => {
            tracing::debug!(error = %e, "Rejected session token");
            AuthError::InvalidToken("Invalid session".to_string())
        }
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Wraps [`session_auth_middleware`] for `axum::middleware::from_fn`
pub fn create_session_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(session_auth_middleware(secret, req, next))
    }
}
