/// Password reset tokens
///
/// The emailed token is 32 random bytes in hex. Only its SHA-256 digest is
/// stored, next to an expiry one hour after issuance. A token is valid while
/// `now < expiry` and is cleared when used.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::password::{hash_password, validate_password_strength, PasswordError};
use crate::models::user::User;
use crate::notify::email::{password_reset_email, Mailer};

/// Lifetime of a reset token
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    /// Unknown, expired or already used token
    #[error("This reset link is invalid or has expired")]
    InvalidToken,

    #[error(transparent)]
    WeakPassword(PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to hash password: {0}")]
    Hash(PasswordError),
}

/// A freshly issued token and what gets stored for it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Sent to the user, never stored
    pub token: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

pub fn generate_reset_token(now: DateTime<Utc>) -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    IssuedToken {
        digest: hash_reset_token(&token),
        token,
        expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
    }
}

pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A token expires exactly at its expiry instant
pub fn is_reset_token_valid(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.map_or(false, |expiry| now < expiry)
}

/// Builds the link sent in the reset email
pub fn reset_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={}",
        base_url.trim_end_matches('/'),
        token
    )
}

/// Issues a token and emails it, if `email` belongs to an active user
///
/// Returns `Ok(())` for unknown or inactive emails so the caller's response
/// cannot be used to discover accounts. Mail failures are logged, not
/// returned; only database errors propagate.
pub async fn request_reset(
    pool: &PgPool,
    mailer: &dyn Mailer,
    base_url: &str,
    email: &str,
) -> Result<(), ResetError> {
    let Some(user) = User::find_by_email(pool, email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    if !user.is_active {
        tracing::info!(user_id = %user.id, "Password reset requested for inactive account");
        return Ok(());
    }

    let issued = generate_reset_token(Utc::now());
    User::set_reset_token(pool, user.id, &issued.digest, issued.expires_at).await?;

    let message = password_reset_email(
        &user.email,
        &user.first_name,
        &reset_url(base_url, &issued.token),
        RESET_TOKEN_TTL_MINUTES,
    );

    if let Err(e) = mailer.send(message).await {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset email");
    } else {
        tracing::info!(user_id = %user.id, "Password reset email sent");
    }

    Ok(())
}

/// Sets a new password using an emailed token
pub async fn complete_reset(
    pool: &PgPool,
    token: &str,
    new_password: &str,
) -> Result<User, ResetError> {
    validate_password_strength(new_password).map_err(ResetError::WeakPassword)?;

    let digest = hash_reset_token(token.trim());
    let user = User::find_by_reset_token(pool, &digest)
        .await?
        .ok_or(ResetError::InvalidToken)?;

    if !user.is_active || !is_reset_token_valid(user.reset_token_expiry, Utc::now()) {
        return Err(ResetError::InvalidToken);
    }

    let password_hash = hash_password(new_password).map_err(ResetError::Hash)?;

    if !User::consume_reset_token(pool, user.id, &digest, &password_hash).await? {
        return Err(ResetError::InvalidToken);
    }

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let now = Utc::now();
        let issued = generate_reset_token(now);

        assert_eq!(issued.token.len(), TOKEN_BYTES * 2);
        assert!(issued.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(issued.digest, hash_reset_token(&issued.token));
        assert_ne!(issued.digest, issued.token);
        assert_eq!(issued.expires_at - now, Duration::hours(1));
    }

    #[test]
    fn test_tokens_are_unique() {
        let now = Utc::now();
        assert_ne!(generate_reset_token(now).token, generate_reset_token(now).token);
    }

    #[test]
    fn test_expiry_boundary() {
        let issued_at = Utc::now();
        let expiry = Some(issued_at + Duration::hours(1));

        assert!(is_reset_token_valid(expiry, issued_at));
        assert!(is_reset_token_valid(expiry, issued_at + Duration::minutes(59)));
        assert!(!is_reset_token_valid(expiry, issued_at + Duration::hours(1)));
        assert!(!is_reset_token_valid(expiry, issued_at + Duration::hours(2)));
        assert!(!is_reset_token_valid(None, issued_at));
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        assert_eq!(
            hash_reset_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_reset_url() {
        assert_eq!(
            reset_url("https://app.example.com/", "deadbeef"),
            "https://app.example.com/reset-password?token=deadbeef"
        );
    }
}
