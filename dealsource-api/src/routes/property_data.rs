/// Property-data provider proxy
///
/// - `GET /api/propertydata/usage` - credits used this calendar month (admin)
/// - `GET /api/propertydata/:endpoint?postcode=` - provider lookup (staff)
///
/// Lookups answer with the provider's JSON unchanged. The `X-Data-Source`
/// header says whether it came from the cache or a fresh (billed) call.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderName,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use dealsource_shared::{
    auth::{
        authorization::{require_admin, require_staff},
        session::Claims,
    },
    property_data::{self, Source, UsageSummary},
};
use serde::Deserialize;

pub const SOURCE_HEADER: HeaderName = HeaderName::from_static("x-data-source");

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub postcode: Option<String>,
}

pub async fn usage(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UsageSummary>> {
    require_admin(&claims)?;

    let limit = state.property_data.config().monthly_limit;
    let summary = property_data::usage(&state.db, limit, Utc::now()).await?;

    Ok(Json(summary))
}

pub async fn lookup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(endpoint): Path<String>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Response> {
    require_staff(&claims)?;

    let postcode = query
        .postcode
        .ok_or_else(|| ApiError::invalid_field("postcode", "Postcode is required"))?;

    let lookup = state
        .property_data
        .fetch(&state.db, &endpoint, &postcode)
        .await?;

    let source = match lookup.source {
        Source::Cache => "cache",
        Source::Provider => "provider",
    };

    tracing::debug!(endpoint = %endpoint, source, user_id = %claims.sub, "Property data lookup");

    Ok(([(SOURCE_HEADER, source)], Json(lookup.data)).into_response())
}
