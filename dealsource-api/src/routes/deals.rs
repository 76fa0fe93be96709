/// Deal endpoints
///
/// - `GET   /api/deals` - list deals, newest activity first
/// - `POST  /api/deals` - create a draft deal
/// - `GET   /api/deals/:id` - get one deal
/// - `PATCH /api/deals/:id` - update deal fields
/// - `POST  /api/deals/:id/status` - move the deal through its workflow
///
/// All of them are for admins and sourcers. Writes to an existing deal also
/// need deal access: a sourcer may only touch deals that are theirs or
/// unassigned.

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
        authorization::{require_deal_access, require_staff},
        session::Claims,
    },
    models::deal::{CreateDeal, Deal, DealFilter, DealStatus, StatusHistoryEntry, UpdateDeal},
    workflow::deal_status::check_transition,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDealsQuery {
    pub status: Option<DealStatus>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 500, message = "Address is required"))]
    pub address: String,

    #[validate(length(max = 10, message = "Postcode is too long"))]
    pub postcode: Option<String>,

    pub property_type: Option<String>,

    #[validate(range(min = 0, max = 50))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 0, max = 50))]
    pub bathrooms: Option<i32>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub asking_price: Option<i64>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub estimated_value: Option<i64>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub refurb_cost: Option<i64>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub monthly_rent: Option<i64>,

    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
}

/// `assignedTo: null` unassigns; leaving it out keeps the current assignee
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDealRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Address cannot be empty"))]
    pub address: Option<String>,

    #[validate(length(max = 10, message = "Postcode is too long"))]
    pub postcode: Option<String>,

    pub property_type: Option<String>,

    #[validate(range(min = 0, max = 50))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 0, max = 50))]
    pub bathrooms: Option<i32>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub asking_price: Option<i64>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub estimated_value: Option<i64>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub refurb_cost: Option<i64>,

    #[validate(range(min = 0, max = 1000000000, message = "Amounts must be between 0 and 1,000,000,000"))]
    pub monthly_rent: Option<i64>,

    pub description: Option<String>,

    #[serde(default, with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,

    #[serde(default, with = "double_option")]
    pub vendor_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeStatusRequest {
    pub status: DealStatus,

    #[validate(length(max = 1000, message = "Note is too long"))]
    pub note: Option<String>,
}

/// Distinguishes a missing field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Loads a deal or answers `404`
pub(crate) async fn load_deal(state: &AppState, id: Uuid) -> ApiResult<Deal> {
    Deal::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Deal not found".to_string()))
}

/// Loads a deal the session may modify
pub(crate) async fn load_modifiable_deal(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
) -> ApiResult<Deal> {
    let deal = load_deal(state, id).await?;
    require_deal_access(claims, deal.created_by, deal.assigned_to)?;
    Ok(deal)
}

pub async fn list_deals(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListDealsQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Deal>>> {
    require_staff(&claims)?;

    let (limit, offset) = page.resolve();
    let filter = DealFilter {
        status: query.status,
        assigned_to: query.assigned_to,
    };

    let deals = Deal::list(&state.db, &filter, limit, offset).await?;
    Ok(Json(deals))
}

/// Creates a deal in `draft`
///
/// # Errors
///
/// - `400 Bad Request`: validation failed or an unknown vendor / assignee
/// - `403 Forbidden`: not staff
pub async fn create_deal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateDealRequest>,
) -> ApiResult<(StatusCode, Json<Deal>)> {
    require_staff(&claims)?;

    let deal = Deal::create(
        &state.db,
        claims.sub,
        CreateDeal {
            title: req.title,
            address: req.address,
            postcode: req.postcode,
            property_type: req.property_type,
            bedrooms: req.bedrooms,
            bathrooms: req.bathrooms,
            asking_price: req.asking_price,
            estimated_value: req.estimated_value,
            refurb_cost: req.refurb_cost,
            monthly_rent: req.monthly_rent,
            description: req.description,
            assigned_to: req.assigned_to,
            vendor_id: req.vendor_id,
        },
    )
    .await?;

    tracing::info!(deal_id = %deal.id, user_id = %claims.sub, "Deal created");

    Ok((StatusCode::CREATED, Json(deal)))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deal>> {
    require_staff(&claims)?;

    Ok(Json(load_deal(&state, id).await?))
}

pub async fn update_deal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateDealRequest>,
) -> ApiResult<Json<Deal>> {
    require_staff(&claims)?;
    load_modifiable_deal(&state, &claims, id).await?;

    let deal = Deal::update(
        &state.db,
        id,
        UpdateDeal {
            title: req.title,
            address: req.address,
            postcode: req.postcode,
            property_type: req.property_type,
            bedrooms: req.bedrooms,
            bathrooms: req.bathrooms,
            asking_price: req.asking_price,
            estimated_value: req.estimated_value,
            refurb_cost: req.refurb_cost,
            monthly_rent: req.monthly_rent,
            description: req.description,
            assigned_to: req.assigned_to,
            vendor_id: req.vendor_id,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Deal not found".to_string()))?;

    Ok(Json(deal))
}

/// Moves a deal to a new status
///
/// # Errors
///
/// - `400 Bad Request`: the move is not in the workflow table
/// - `403 Forbidden`: no deal access, or an admin-only move by a sourcer
/// - `404 Not Found`: no such deal
/// - `409 Conflict`: the status changed while the request was in flight
pub async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ChangeStatusRequest>,
) -> ApiResult<Json<Deal>> {
    require_staff(&claims)?;
    let deal = load_modifiable_deal(&state, &claims, id).await?;

    check_transition(claims.role, deal.status, req.status)?;

    let entry = StatusHistoryEntry::new(req.status, Some(claims.sub), req.note);
    let updated = Deal::change_status(&state.db, id, deal.status, entry)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict("Deal status changed by someone else; reload and try again".to_string())
        })?;

    tracing::info!(
        deal_id = %id,
        from = %deal.status,
        to = %updated.status,
        user_id = %claims.sub,
        "Deal status changed"
    );

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_from_missing() {
        let missing: UpdateDealRequest = serde_json::from_str(r#"{"title":"Flat"}"#).unwrap();
        assert_eq!(missing.assigned_to, None);

        let cleared: UpdateDealRequest = serde_json::from_str(r#"{"assignedTo":null}"#).unwrap();
        assert_eq!(cleared.assigned_to, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateDealRequest =
            serde_json::from_str(&format!(r#"{{"assignedTo":"{}"}}"#, id)).unwrap();
        assert_eq!(set.assigned_to, Some(Some(id)));
    }

    #[test]
    fn test_create_request_rejects_negative_amounts() {
        let req: CreateDealRequest = serde_json::from_str(
            r#"{"title":"Terrace","address":"1 High St","askingPrice":-1}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("asking_price"));
    }

    #[test]
    fn test_amounts_have_an_upper_bound() {
        let req: CreateDealRequest = serde_json::from_str(&format!(
            r#"{{"title":"Terrace","address":"1 High St","askingPrice":{},"monthlyRent":{}}}"#,
            i64::MAX,
            i64::MAX / 2
        ))
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("asking_price"));
        assert!(errors.field_errors().contains_key("monthly_rent"));

        let update: UpdateDealRequest =
            serde_json::from_str(r#"{"refurbCost":1000000001}"#).unwrap();
        assert!(update.validate().unwrap_err().field_errors().contains_key("refurb_cost"));

        let ok: UpdateDealRequest = serde_json::from_str(r#"{"refurbCost":1000000000}"#).unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_status_request_parses_lowercase() {
        let req: ChangeStatusRequest =
            serde_json::from_str(r#"{"status":"review","note":"ready"}"#).unwrap();
        assert_eq!(req.status, DealStatus::Review);
    }
}
