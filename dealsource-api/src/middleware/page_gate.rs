/// Page gate for `/dashboard*` and `/login`
///
/// Decodes the session cookie (or Bearer header) if present and asks
/// [`page_access`] whether the page may be shown. A redirect answers with
/// `303 See Other`; an allowed request carries the decoded claims, when there
/// are any, as an `Option<Claims>` extension.
///
/// An invalid or expired token is treated as no session.

use crate::app::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use dealsource_shared::auth::{
    authorization::{page_access, RouteDecision},
    middleware::session_from_headers,
};

pub async fn page_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = session_from_headers(req.headers(), state.session_secret());
    let path = req.uri().path().to_string();

    match page_access(&path, claims.as_ref().map(|c| c.role)) {
        RouteDecision::Redirect(target) => {
            tracing::debug!(path = %path, target, "Page gate redirect");
            Redirect::to(target).into_response()
        }
        RouteDecision::Allow => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
    }
}
