/// Investor portal
///
/// `GET /api/portal/deals` lists the deals currently offered to investors.
/// Any signed-in user may call it.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use dealsource_shared::{
    auth::session::Claims,
    models::deal::{Deal, PortalDeal},
};

pub async fn list_available(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PortalDeal>>> {
    let deals = Deal::list_available(&state.db).await?;

    tracing::debug!(user_id = %claims.sub, count = deals.len(), "Portal deals listed");

    Ok(Json(deals))
}
