/// Investor endpoints
///
/// - `GET   /api/investors[?includeInactive=true]`
/// - `POST  /api/investors`
/// - `GET   /api/investors/:id`
/// - `PATCH /api/investors/:id`
///
/// Admins and sourcers only. Investors are deactivated, never deleted.

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
    models::investor::{budget_range_is_valid, CreateInvestor, Investor, UpdateInvestor},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvestorsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvestorRequest {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub company: Option<String>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub min_budget: Option<i64>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub max_budget: Option<i64>,

    #[serde(default)]
    pub preferred_areas: Vec<String>,

    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvestorRequest {
    #[validate(length(min = 1, max = 100, message = "First name cannot be empty"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub phone: Option<String>,
    pub company: Option<String>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub min_budget: Option<i64>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub max_budget: Option<i64>,

    pub preferred_areas: Option<Vec<String>>,
    pub notes: Option<String>,

    #[serde(default, with = "double_option")]
    pub user_id: Option<Option<Uuid>>,

    pub is_active: Option<bool>,
}

fn check_budget(min: Option<i64>, max: Option<i64>) -> ApiResult<()> {
    if budget_range_is_valid(min, max) {
        Ok(())
    } else {
        Err(ApiError::invalid_field(
            "maxBudget",
            "Maximum budget must not be below the minimum",
        ))
    }
}

fn clean_areas(areas: Vec<String>) -> Vec<String> {
    areas
        .into_iter()
        .map(|area| area.trim().to_string())
        .filter(|area| !area.is_empty())
        .collect()
}

pub async fn list_investors(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListInvestorsQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Investor>>> {
    require_staff(&claims)?;

    let (limit, offset) = page.resolve();
    let investors = Investor::list(&state.db, query.include_inactive, limit, offset).await?;

    Ok(Json(investors))
}

pub async fn create_investor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateInvestorRequest>,
) -> ApiResult<(StatusCode, Json<Investor>)> {
    require_staff(&claims)?;
    check_budget(req.min_budget, req.max_budget)?;

    let investor = Investor::create(
        &state.db,
        claims.sub,
        CreateInvestor {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            min_budget: req.min_budget,
            max_budget: req.max_budget,
            preferred_areas: clean_areas(req.preferred_areas),
            notes: req.notes,
            user_id: req.user_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(investor)))
}

pub async fn get_investor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Investor>> {
    require_staff(&claims)?;

    let investor = Investor::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Investor not found".to_string()))?;

    Ok(Json(investor))
}

/// Updates an investor; the budget range is checked against the merged values
pub async fn update_investor(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateInvestorRequest>,
) -> ApiResult<Json<Investor>> {
    require_staff(&claims)?;

    let current = Investor::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Investor not found".to_string()))?;

    check_budget(
        req.min_budget.or(current.min_budget),
        req.max_budget.or(current.max_budget),
    )?;

    let investor = Investor::update(
        &state.db,
        id,
        UpdateInvestor {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            min_budget: req.min_budget,
            max_budget: req.max_budget,
            preferred_areas: req.preferred_areas.map(clean_areas),
            notes: req.notes,
            user_id: req.user_id,
            is_active: req.is_active,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Investor not found".to_string()))?;

    Ok(Json(investor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_check() {
        assert!(check_budget(Some(100_000), Some(250_000)).is_ok());
        assert!(check_budget(None, Some(250_000)).is_ok());
        assert!(matches!(
            check_budget(Some(300_000), Some(250_000)),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_clean_areas() {
        assert_eq!(
            clean_areas(vec![" Leeds ".to_string(), "".to_string(), "M1".to_string()]),
            vec!["Leeds".to_string(), "M1".to_string()]
        );
    }
}
