/// Investor pack template endpoints
///
/// - `GET    /api/investor-pack-templates` - default first, then by name
/// - `POST   /api/investor-pack-templates`
/// - `PATCH  /api/investor-pack-templates/:id`
/// - `DELETE /api/investor-pack-templates/:id`
/// - `POST   /api/investor-pack-templates/:id/set-default` - `{template}`
///
/// Admins and sourcers only.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use dealsource_shared::{
    auth::{authorization::require_staff, session::Claims},
    models::investor_pack_template::{
        CreateTemplate, InvestorPackTemplate, PackSectionKind, UpdateTemplate,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub company_name: Option<String>,

    #[validate(length(max = 4000, message = "Intro text is too long"))]
    pub intro_text: Option<String>,

    #[validate(length(max = 1000, message = "Footer text is too long"))]
    pub footer_text: Option<String>,

    /// Defaults to every section in the standard order
    pub sections: Option<Vec<PackSectionKind>>,

    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub company_name: Option<String>,

    #[validate(length(max = 4000, message = "Intro text is too long"))]
    pub intro_text: Option<String>,

    #[validate(length(max = 1000, message = "Footer text is too long"))]
    pub footer_text: Option<String>,

    pub sections: Option<Vec<PackSectionKind>>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub template: InvestorPackTemplate,
}

/// A section list must be non-empty and name each section at most once
fn check_sections(sections: &[PackSectionKind]) -> ApiResult<()> {
    if sections.is_empty() {
        return Err(ApiError::invalid_field("sections", "At least one section is required"));
    }

    let mut seen = HashSet::new();
    if !sections.iter().all(|kind| seen.insert(*kind)) {
        return Err(ApiError::invalid_field("sections", "Sections must not repeat"));
    }

    Ok(())
}

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<InvestorPackTemplate>>> {
    require_staff(&claims)?;

    Ok(Json(InvestorPackTemplate::list(&state.db).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<InvestorPackTemplate>)> {
    require_staff(&claims)?;

    let sections = req
        .sections
        .unwrap_or_else(|| PackSectionKind::DEFAULT_ORDER.to_vec());
    check_sections(&sections)?;

    let template = InvestorPackTemplate::create(
        &state.db,
        claims.sub,
        CreateTemplate {
            name: req.name,
            description: req.description,
            company_name: req.company_name,
            intro_text: req.intro_text,
            footer_text: req.footer_text,
            sections,
            is_default: req.is_default,
        },
    )
    .await?;

    tracing::info!(template_id = %template.id, is_default = template.is_default, "Template created");

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTemplateRequest>,
) -> ApiResult<Json<InvestorPackTemplate>> {
    require_staff(&claims)?;

    if let Some(sections) = &req.sections {
        check_sections(sections)?;
    }

    let template = InvestorPackTemplate::update(
        &state.db,
        id,
        UpdateTemplate {
            name: req.name,
            description: req.description,
            company_name: req.company_name,
            intro_text: req.intro_text,
            footer_text: req.footer_text,
            sections: req.sections,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;

    Ok(Json(template))
}

/// Deleting the default template leaves packs on the built-in layout
pub async fn delete_template(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_staff(&claims)?;

    if !InvestorPackTemplate::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Template not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Makes one template the only default
///
/// # Errors
///
/// - `403 Forbidden`: not staff
/// - `404 Not Found`: no such template (no flag is changed)
pub async fn set_default(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TemplateResponse>> {
    require_staff(&claims)?;

    let template = InvestorPackTemplate::set_default(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;

    Ok(Json(TemplateResponse { template }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_sections() {
        assert!(check_sections(&PackSectionKind::DEFAULT_ORDER).is_ok());
        assert!(check_sections(&[]).is_err());
        assert!(check_sections(&[PackSectionKind::Photos, PackSectionKind::Photos]).is_err());
    }

    #[test]
    fn test_create_request_section_names() {
        let req: CreateTemplateRequest = serde_json::from_str(
            r#"{"name":"Short","sections":["overview","financials"],"isDefault":true}"#,
        )
        .unwrap();
        assert_eq!(
            req.sections.unwrap(),
            vec![PackSectionKind::Overview, PackSectionKind::Financials]
        );
        assert!(req.is_default);
    }
}
