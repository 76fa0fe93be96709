/// Email/password sign-in

use sqlx::PgPool;

use super::password::{verify_password, PasswordError};
use crate::models::user::User;

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// Unknown email, no password set, or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("This account has been deactivated")]
    InactiveAccount,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Checks an email/password pair and records the login
///
/// The active flag is only consulted after the password matched, so a caller
/// without the password cannot learn whether an account was deactivated.
pub async fn authenticate(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<User, CredentialsError> {
    let user = User::find_by_email(pool, email)
        .await?
        .ok_or(CredentialsError::InvalidCredentials)?;

    check_password(&user, password)?;

    if !user.is_active {
        tracing::info!(user_id = %user.id, "Sign-in refused for inactive account");
        return Err(CredentialsError::InactiveAccount);
    }

    User::update_last_login(pool, user.id).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User signed in");
    Ok(user)
}

/// Verifies `password` against the user's stored hash
pub fn check_password(user: &User, password: &str) -> Result<(), CredentialsError> {
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(CredentialsError::InvalidCredentials)?;

    if verify_password(password, hash)? {
        Ok(())
    } else {
        Err(CredentialsError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::models::user::UserRole;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(password_hash: Option<String>, is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "pat@example.com".to_string(),
            first_name: "Pat".to_string(),
            last_name: "Doyle".to_string(),
            role: UserRole::Sourcer,
            is_active,
            password_hash,
            reset_token: None,
            reset_token_expiry: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_password_matches() {
        let hash = hash_password("correct-horse-1").unwrap();
        assert!(check_password(&user(Some(hash), true), "correct-horse-1").is_ok());
    }

    #[test]
    fn test_check_password_wrong_or_missing() {
        let hash = hash_password("correct-horse-1").unwrap();
        assert!(matches!(
            check_password(&user(Some(hash), true), "wrong-horse-1"),
            Err(CredentialsError::InvalidCredentials)
        ));
        assert!(matches!(
            check_password(&user(None, true), "anything"),
            Err(CredentialsError::InvalidCredentials)
        ));
    }
}
