/// User endpoints
///
/// - `GET   /api/users/team` - active admins and sourcers (staff)
/// - `GET   /api/users` / `POST /api/users` - user management (admin)
/// - `PATCH /api/users/:id` - change name, role or active flag (admin)
/// - `GET   /api/users/me` / `PATCH /api/users/me` - own profile (any session)
///
/// Changing your own password requires the current one. Admins cannot demote
/// or deactivate themselves, so at least the acting admin always remains.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::Pagination,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use dealsource_shared::{
    auth::{
        authorization::{require_admin, require_staff},
        credentials::check_password,
        password::{hash_password, validate_password_strength},
        session::Claims,
    },
    models::user::{CreateUser, TeamMember, UpdateUser, User, UserRole},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    pub role: UserRole,

    /// Without one the user signs in after a password reset
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,

    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,

    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Admins may not take away their own access
fn check_self_update(claims: &Claims, target: Uuid, req: &UpdateUserRequest) -> ApiResult<()> {
    if claims.sub != target {
        return Ok(());
    }

    if req.role.is_some_and(|role| role != UserRole::Admin) {
        return Err(ApiError::invalid_field("role", "You cannot change your own role"));
    }

    if req.is_active == Some(false) {
        return Err(ApiError::invalid_field("isActive", "You cannot deactivate your own account"));
    }

    Ok(())
}

/// Assignment picker; requires a staff session
pub async fn team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<TeamMember>>> {
    require_staff(&claims)?;

    Ok(Json(User::list_team(&state.db).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<User>>> {
    require_admin(&claims)?;

    let (limit, offset) = page.resolve();
    Ok(Json(User::list(&state.db, limit, offset).await?))
}

/// Creates a user account
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or the password is too weak
/// - `403 Forbidden`: not an admin
/// - `409 Conflict`: the email is already registered
pub async fn create_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    require_admin(&claims)?;

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            validate_password_strength(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            role: req.role,
            password_hash,
            is_active: true,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, created_by = %claims.sub, "User created");

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_admin(&claims)?;
    check_self_update(&claims, id, &req)?;

    let update = UpdateUser {
        first_name: req.first_name,
        last_name: req.last_name,
        role: req.role,
        is_active: req.is_active,
    };

    if update.is_empty() {
        return Ok(Json(load_user(&state, id).await?));
    }

    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, updated_by = %claims.sub, "User updated");

    Ok(Json(user))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<User>> {
    Ok(Json(load_user(&state, claims.sub).await?))
}

/// Updates the signed-in user's name and, optionally, password
///
/// # Errors
///
/// - `400 Bad Request`: weak new password, or a new password without the
///   current one
/// - `401 Unauthorized`: the current password is wrong
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let user = load_user(&state, claims.sub).await?;

    if let Some(new_password) = req.new_password.as_deref() {
        let current = req.current_password.as_deref().ok_or_else(|| {
            ApiError::invalid_field("currentPassword", "Current password is required")
        })?;

        check_password(&user, current)?;
        validate_password_strength(new_password)?;

        let hash = hash_password(new_password)?;
        User::set_password(&state.db, user.id, &hash).await?;

        tracing::info!(user_id = %user.id, "Password changed");
    }

    let update = UpdateUser {
        first_name: req.first_name,
        last_name: req.last_name,
        ..Default::default()
    };

    if update.is_empty() {
        return Ok(Json(load_user(&state, user.id).await?));
    }

    let user = User::update(&state.db, user.id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}
