/// Investor pack download
///
/// `GET /api/deals/:id/investor-pack[?templateId=]` renders the deal as a PDF.
/// The layout comes from the requested template, else the default template,
/// else the built-in layout.
///
/// Staff may download a pack for any deal. Investors only see packs for
/// `available` deals; any other deal answers `404` so unlisted deals are not
/// revealed.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use dealsource_shared::{
    auth::{authorization::can_view_investor_pack, session::Claims},
    models::{
        deal::Deal, deal_photo::DealPhoto, investor_pack_template::InvestorPackTemplate,
    },
    pack::{assemble, pack_filename, pdf, PackLayout},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackQuery {
    pub template_id: Option<Uuid>,
}

async fn resolve_layout(state: &AppState, template_id: Option<Uuid>) -> ApiResult<PackLayout> {
    if let Some(id) = template_id {
        let template = InvestorPackTemplate::find_by_id(&state.db, id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Template not found".to_string()))?;
        return Ok(PackLayout::from(&template));
    }

    Ok(InvestorPackTemplate::find_default(&state.db)
        .await?
        .as_ref()
        .map(PackLayout::from)
        .unwrap_or_else(PackLayout::built_in))
}

pub async fn generate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<PackQuery>,
) -> ApiResult<Response> {
    let deal = Deal::find_by_id(&state.db, id)
        .await?
        .filter(|deal| can_view_investor_pack(claims.role, deal.status))
        .ok_or_else(|| ApiError::NotFound("Deal not found".to_string()))?;

    let layout = resolve_layout(&state, query.template_id).await?;
    let photos = DealPhoto::list_for_deal(&state.db, id).await?;

    let document = assemble(&deal, &photos, &layout, Utc::now().date_naive());
    let bytes = pdf::render(&document)?;

    tracing::info!(
        deal_id = %deal.id,
        user_id = %claims.sub,
        size = bytes.len(),
        "Investor pack generated"
    );

    let disposition = format!("attachment; filename=\"{}\"", pack_filename(&deal));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}
