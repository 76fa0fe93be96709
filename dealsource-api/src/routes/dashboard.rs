/// Page-gated routes
///
/// The page gate has already redirected anyone who may not see the page, so
/// these handlers only describe what the frontend should render.

use axum::{extract::Request, Extension, Json};
use dealsource_shared::auth::{
    authorization::{nav_sections, NavSection},
    session::Claims,
};
use serde::Serialize;
use uuid::Uuid;

use dealsource_shared::models::user::UserRole;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardShell {
    pub path: String,
    pub user: Option<ShellUser>,
    pub navigation: Vec<NavSection>,
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub page: &'static str,
    pub action: &'static str,
    pub forgot_password: &'static str,
}

pub async fn login_page() -> Json<LoginPage> {
    Json(LoginPage {
        page: "login",
        action: "/api/auth/login",
        forgot_password: "/api/auth/forgot-password",
    })
}

pub async fn dashboard_shell(
    Extension(claims): Extension<Option<Claims>>,
    req: Request,
) -> Json<DashboardShell> {
    let navigation = claims
        .as_ref()
        .map(|c| nav_sections(c.role))
        .unwrap_or_default();

    Json(DashboardShell {
        path: req.uri().path().to_string(),
        user: claims.map(|c| ShellUser {
            id: c.sub,
            email: c.email,
            role: c.role,
        }),
        navigation,
    })
}
