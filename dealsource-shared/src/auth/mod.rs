/// Authentication and access control
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and strength rules
/// - [`session`]: signed session tokens (HS256 JWT)
/// - [`middleware`]: axum session layer (Bearer header or session cookie)
/// - [`authorization`]: role checks, deal ownership and the page gate
/// - [`credentials`]: email/password sign-in
/// - [`reset`]: password reset tokens
///
/// # Example
///
/// ```no_run
/// use dealsource_shared::auth::credentials::authenticate;
/// use dealsource_shared::auth::session::{create_token, Claims};
/// use chrono::Duration;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = authenticate(&pool, "sam@example.com", "Kitchen-Extension-42").await?;
/// let token = create_token(&Claims::for_user(&user, Duration::days(30)), "secret")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod credentials;
pub mod middleware;
pub mod password;
pub mod reset;
pub mod session;
