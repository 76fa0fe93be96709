/// Deal photo endpoints
///
/// - `GET    /api/deals/:id/photos` - list photos, cover first
/// - `POST   /api/deals/:id/photos` - add a photo by URL
/// - `DELETE /api/deals/:id/photos/:photo_id` - remove a photo
/// - `PUT    /api/deals/:id/photos/:photo_id/cover` - make it the cover
///
/// Photo URLs must point at one of the configured remote image hosts.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::deals::{load_deal, load_modifiable_deal},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use dealsource_shared::{
    auth::{authorization::require_staff, session::Claims},
    models::deal_photo::{is_allowed_photo_url, CoverOutcome, CreatePhoto, DealPhoto},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPhotoRequest {
    #[validate(url(message = "Invalid photo URL"))]
    pub url: String,

    #[validate(length(max = 500, message = "Caption is too long"))]
    pub caption: Option<String>,

    #[validate(range(min = 0))]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub async fn list_photos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<DealPhoto>>> {
    require_staff(&claims)?;
    load_deal(&state, id).await?;

    Ok(Json(DealPhoto::list_for_deal(&state.db, id).await?))
}

/// Adds a photo; the first photo of a deal becomes its cover
///
/// # Errors
///
/// - `400 Bad Request`: invalid URL or a host outside the allowlist
/// - `403 Forbidden`: not staff, or no access to the deal
/// - `404 Not Found`: no such deal
pub async fn add_photo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddPhotoRequest>,
) -> ApiResult<(StatusCode, Json<DealPhoto>)> {
    require_staff(&claims)?;
    load_modifiable_deal(&state, &claims, id).await?;

    if !is_allowed_photo_url(&req.url, &state.config.api.image_remote_hosts) {
        return Err(ApiError::invalid_field(
            "url",
            "Photo host is not in the allowed image hosts",
        ));
    }

    let photo = DealPhoto::create(
        &state.db,
        id,
        CreatePhoto {
            url: req.url,
            caption: req.caption,
            sort_order: req.sort_order,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Deal not found".to_string()))?;

    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, photo_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_staff(&claims)?;
    load_modifiable_deal(&state, &claims, id).await?;

    if !DealPhoto::delete(&state.db, id, photo_id).await? {
        return Err(ApiError::NotFound("Photo not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Makes one photo the deal's only cover
///
/// # Errors
///
/// - `403 Forbidden`: not staff, or no access to the deal
/// - `404 Not Found`: no such deal, or the photo is not one of its photos
pub async fn set_cover(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, photo_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<SuccessResponse>> {
    require_staff(&claims)?;
    load_modifiable_deal(&state, &claims, id).await?;

    match DealPhoto::set_cover(&state.db, id, photo_id).await? {
        CoverOutcome::Updated => Ok(Json(SuccessResponse { success: true })),
        CoverOutcome::DealNotFound => Err(ApiError::NotFound("Deal not found".to_string())),
        CoverOutcome::PhotoNotFound => Err(ApiError::NotFound("Photo not found".to_string())),
    }
}
