/// Signed session tokens
///
/// A session is an HS256 JWT whose claims carry the user id, email and role.
/// Nothing is stored server-side: every request decodes and verifies the
/// token, so a role change takes effect when the user next signs in.
///
/// # Example
///
/// ```
/// use dealsource_shared::auth::session::{create_token, validate_token, Claims};
/// use dealsource_shared::models::user::UserRole;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-session-secret-of-at-least-32-bytes!";
/// let claims = Claims::new(Uuid::new_v4(), "sam@example.com", UserRole::Sourcer, Duration::days(30));
/// let token = create_token(&claims, secret)?;
///
/// let decoded = validate_token(&token, secret)?;
/// assert_eq!(decoded.role, UserRole::Sourcer);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{User, UserRole};

/// Issuer written into and required from every token
pub const ISSUER: &str = "dealsource";

/// Name of the HTTP-only cookie that carries the token for browser clients
pub const SESSION_COOKIE: &str = "dealsource.session-token";

/// Default lifetime of a session
pub const DEFAULT_MAX_AGE_DAYS: i64 = 30;

/// Shortest secret accepted for signing
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to create session token: {0}")]
    CreateError(String),

    #[error("Session has expired")]
    Expired,

    #[error("Session token is not valid yet")]
    NotYetValid,

    #[error("Session token was issued by another service")]
    InvalidIssuer,

    #[error("Invalid session token: {0}")]
    Invalid(String),
}

/// Session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,

    pub email: String,

    pub role: UserRole,

    pub iss: String,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Not before (unix seconds)
    pub nbf: i64,

    /// Expiry (unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: &str, role: UserRole, max_age: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            email: email.to_string(),
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + max_age).timestamp(),
        }
    }

    pub fn for_user(user: &User, max_age: Duration) -> Self {
        Self::new(user.id, &user.email, user.role, max_age)
    }

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, zero once expired
    pub fn remaining_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, SessionError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| SessionError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, `exp` and `nbf` and returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, SessionError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => SessionError::Expired,
        ErrorKind::ImmatureSignature => SessionError::NotYetValid,
        ErrorKind::InvalidIssuer => SessionError::InvalidIssuer,
        _ => SessionError::Invalid(e.to_string()),
    })?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    fn claims(role: UserRole) -> Claims {
        Claims::new(Uuid::new_v4(), "jo@example.com", role, Duration::days(30))
    }

    #[test]
    fn test_claims_defaults() {
        let c = claims(UserRole::Admin);

        assert_eq!(c.iss, ISSUER);
        assert_eq!(c.iat, c.nbf);
        assert_eq!(c.exp - c.iat, 30 * 24 * 3600);
        assert!(!c.is_expired());
        assert!(c.remaining_seconds() > 0);
    }

    #[test]
    fn test_create_and_validate() {
        let original = claims(UserRole::Investor);
        let token = create_token(&original, SECRET).expect("token");

        assert_eq!(token.split('.').count(), 3);

        let decoded = validate_token(&token, SECRET).expect("valid token");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(&claims(UserRole::Admin), SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, "some-other-secret-of-sufficient-size"),
            Err(SessionError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut c = claims(UserRole::Sourcer);
        c.iat -= 7200;
        c.nbf -= 7200;
        c.exp = Utc::now().timestamp() - 60;

        let token = create_token(&c, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(SessionError::Expired)));
    }

    #[test]
    fn test_future_token_rejected() {
        let mut c = claims(UserRole::Sourcer);
        c.nbf = Utc::now().timestamp() + 3600;

        let token = create_token(&c, SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(SessionError::NotYetValid)
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut c = claims(UserRole::Admin);
        c.iss = "someone-else".to_string();

        let token = create_token(&c, SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, SECRET),
            Err(SessionError::InvalidIssuer)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(validate_token("not.a.jwt", SECRET).is_err());
        assert!(validate_token("", SECRET).is_err());
    }
}
