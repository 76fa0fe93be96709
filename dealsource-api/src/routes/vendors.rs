/// Vendor endpoints
///
/// - `GET   /api/vendors[?stage=]` - list vendors, newest first
/// - `POST  /api/vendors` - create a lead (enters the pipeline as `new_lead`)
/// - `GET   /api/vendors/:id`
/// - `PATCH /api/vendors/:id`
/// - `PUT   /api/vendors/:id/stage` - manual pipeline move
/// - `GET   /api/vendors/:id/messages` - SMS log
///
/// Phone numbers are stored normalized so inbound replies can be matched.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
    routes::{deals::double_option, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use dealsource_shared::{
    auth::{authorization::require_staff, session::Claims},
    models::{
        sms_message::SmsMessage,
        vendor::{
            CreateVendor, PipelineStage, PropertyCondition, UpdateVendor, Vendor, VendorUrgency,
        },
    },
    notify::sms::normalize_phone,
    workflow::pipeline::{check_stage_transition, Actor},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListVendorsQuery {
    pub stage: Option<PipelineStage>,
}

fn default_urgency() -> VendorUrgency {
    VendorUrgency::Medium
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVendorRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Property address is required"))]
    pub property_address: String,

    #[validate(length(max = 10, message = "Postcode is too long"))]
    pub postcode: Option<String>,

    #[serde(default = "default_urgency")]
    pub urgency: VendorUrgency,

    pub property_condition: Option<PropertyCondition>,
    pub reason_for_sale: Option<String>,

    #[validate(range(min = 0, message = "Asking price cannot be negative"))]
    pub asking_price: Option<i64>,

    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVendorRequest {
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Property address cannot be empty"))]
    pub property_address: Option<String>,

    #[validate(length(max = 10, message = "Postcode is too long"))]
    pub postcode: Option<String>,

    pub urgency: Option<VendorUrgency>,
    pub property_condition: Option<PropertyCondition>,
    pub reason_for_sale: Option<String>,

    #[validate(range(min = 0, message = "Asking price cannot be negative"))]
    pub asking_price: Option<i64>,

    pub notes: Option<String>,

    #[serde(default, with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStageRequest {
    pub stage: PipelineStage,
}

fn parse_phone(raw: Option<String>) -> ApiResult<Option<String>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => normalize_phone(value)
            .map(Some)
            .ok_or_else(|| ApiError::invalid_field("phone", "Invalid phone number")),
    }
}

async fn load_vendor(state: &AppState, id: Uuid) -> ApiResult<Vendor> {
    Vendor::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vendor not found".to_string()))
}

pub async fn list_vendors(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListVendorsQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Vendor>>> {
    require_staff(&claims)?;

    let (limit, offset) = page.resolve();
    Ok(Json(Vendor::list(&state.db, query.stage, limit, offset).await?))
}

pub async fn create_vendor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateVendorRequest>,
) -> ApiResult<(StatusCode, Json<Vendor>)> {
    require_staff(&claims)?;

    let phone = parse_phone(req.phone)?;

    let vendor = Vendor::create(
        &state.db,
        Some(claims.sub),
        CreateVendor {
            first_name: req.first_name,
            last_name: req.last_name,
            phone,
            email: req.email,
            property_address: req.property_address,
            postcode: req.postcode,
            urgency: req.urgency,
            property_condition: req.property_condition,
            reason_for_sale: req.reason_for_sale,
            asking_price: req.asking_price,
            notes: req.notes,
            assigned_to: req.assigned_to,
        },
    )
    .await?;

    tracing::info!(vendor_id = %vendor.id, user_id = %claims.sub, "Vendor lead created");

    Ok((StatusCode::CREATED, Json(vendor)))
}

pub async fn get_vendor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vendor>> {
    require_staff(&claims)?;

    Ok(Json(load_vendor(&state, id).await?))
}

pub async fn update_vendor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateVendorRequest>,
) -> ApiResult<Json<Vendor>> {
    require_staff(&claims)?;

    let phone = parse_phone(req.phone)?;

    let vendor = Vendor::update(
        &state.db,
        id,
        UpdateVendor {
            first_name: req.first_name,
            last_name: req.last_name,
            phone,
            email: req.email,
            property_address: req.property_address,
            postcode: req.postcode,
            urgency: req.urgency,
            property_condition: req.property_condition,
            reason_for_sale: req.reason_for_sale,
            asking_price: req.asking_price,
            notes: req.notes,
            assigned_to: req.assigned_to,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Vendor not found".to_string()))?;

    Ok(Json(vendor))
}

/// Moves a vendor to another pipeline stage
///
/// # Errors
///
/// - `400 Bad Request`: the move is not allowed for staff
/// - `403 Forbidden`: reopening a lost / unresponsive vendor as a sourcer
/// - `404 Not Found`: no such vendor
/// - `409 Conflict`: the stage changed since it was read (e.g. by the worker)
pub async fn change_stage(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStageRequest>,
) -> ApiResult<Json<Vendor>> {
    require_staff(&claims)?;
    let vendor = load_vendor(&state, id).await?;

    check_stage_transition(Actor::Staff(claims.role), vendor.stage, req.stage)?;

    let updated = Vendor::set_stage(&state.db, id, vendor.stage, req.stage)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict("Vendor stage changed by someone else; reload and try again".to_string())
        })?;

    tracing::info!(
        vendor_id = %id,
        from = %vendor.stage,
        to = %updated.stage,
        user_id = %claims.sub,
        "Vendor stage changed"
    );

    Ok(Json(updated))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<SmsMessage>>> {
    require_staff(&claims)?;
    load_vendor(&state, id).await?;

    Ok(Json(SmsMessage::list_for_vendor(&state.db, id).await?))
}
