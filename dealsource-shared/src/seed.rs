/// Bootstrap admin account
///
/// Run at API start-up so a fresh database has someone who can log in.

use sqlx::PgPool;

use crate::auth::password::{hash_password, validate_password_strength, PasswordError};
use crate::models::user::{CreateUser, User, UserRole};

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Admin password rejected: {0}")]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Creates an active admin unless a user with the seed email already exists.
/// Returns the new user, or `None` when nothing was created.
pub async fn ensure_admin_user(pool: &PgPool, seed: &AdminSeed) -> Result<Option<User>, SeedError> {
    if let Some(existing) = User::find_by_email(pool, &seed.email).await? {
        tracing::debug!(user_id = %existing.id, "Admin seed skipped, user exists");
        return Ok(None);
    }

    validate_password_strength(&seed.password)?;
    let password_hash = hash_password(&seed.password)?;

    let user = User::create(
        pool,
        CreateUser {
            email: seed.email.clone(),
            first_name: seed.first_name.clone(),
            last_name: seed.last_name.clone(),
            role: UserRole::Admin,
            password_hash: Some(password_hash),
            is_active: true,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Seeded admin user");
    Ok(Some(user))
}
