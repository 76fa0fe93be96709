/// Access policy
///
/// Pure functions over session claims, kept free of axum and the database so
/// the same rules back the API handlers, the page gate and the tests.
///
/// # Roles
///
/// - **admin**: everything, including user management and usage reports
/// - **sourcer**: deals, vendors, investors and templates; deals they own or
///   that nobody owns yet
/// - **investor**: the investor portal only

use serde::Serialize;
use uuid::Uuid;

use super::session::Claims;
use crate::models::deal::DealStatus;
use crate::models::user::UserRole;

/// Roles that work in the dashboard
pub const STAFF: &[UserRole] = &[UserRole::Admin, UserRole::Sourcer];

/// Admin-only operations
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Insufficient permissions: role {actual} is not allowed")]
    InsufficientRole { actual: UserRole },

    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Fails unless the session role is in `allowed`
pub fn require_role(claims: &Claims, allowed: &[UserRole]) -> Result<(), AuthzError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            actual: claims.role,
        })
    }
}

pub fn require_staff(claims: &Claims) -> Result<(), AuthzError> {
    require_role(claims, STAFF)
}

pub fn require_admin(claims: &Claims) -> Result<(), AuthzError> {
    require_role(claims, ADMIN_ONLY)
}

/// Whether the session may modify a deal
///
/// Admins always may. Sourcers may when the deal is assigned to them, was
/// created by them, or is not assigned to anyone. Investors never may.
pub fn can_modify_deal(claims: &Claims, created_by: Uuid, assigned_to: Option<Uuid>) -> bool {
    match claims.role {
        UserRole::Admin => true,
        UserRole::Sourcer => match assigned_to {
            None => true,
            Some(assignee) => assignee == claims.sub || created_by == claims.sub,
        },
        UserRole::Investor => false,
    }
}

pub fn require_deal_access(
    claims: &Claims,
    created_by: Uuid,
    assigned_to: Option<Uuid>,
) -> Result<(), AuthzError> {
    if can_modify_deal(claims, created_by, assigned_to) {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Staff may build a pack for any deal, investors only for listed ones
pub fn can_view_investor_pack(role: UserRole, status: DealStatus) -> bool {
    role.is_staff() || status == DealStatus::Available
}

/// Outcome of the page gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

const ADMIN_PAGES: &[&str] = &["/dashboard/settings", "/dashboard/users"];

/// True when `path` is `prefix` itself or a sub-path of it
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

/// Decides whether a page request may proceed
///
/// ```
/// use dealsource_shared::auth::authorization::{page_access, RouteDecision};
/// use dealsource_shared::models::user::UserRole;
///
/// assert_eq!(page_access("/dashboard/deals", None), RouteDecision::Redirect("/login"));
/// assert_eq!(page_access("/dashboard/users", Some(UserRole::Sourcer)), RouteDecision::Redirect("/dashboard"));
/// assert_eq!(page_access("/login", Some(UserRole::Investor)), RouteDecision::Redirect("/"));
/// ```
pub fn page_access(path: &str, role: Option<UserRole>) -> RouteDecision {
    if under(path, "/dashboard") {
        return match role {
            None => RouteDecision::Redirect("/login"),
            Some(UserRole::Investor) => RouteDecision::Redirect("/"),
            Some(UserRole::Sourcer) if ADMIN_PAGES.iter().any(|p| under(path, p)) => {
                RouteDecision::Redirect("/dashboard")
            }
            Some(_) => RouteDecision::Allow,
        };
    }

    if under(path, "/login") {
        return match role {
            Some(r) if r.is_staff() => RouteDecision::Redirect("/dashboard"),
            Some(_) => RouteDecision::Redirect("/"),
            None => RouteDecision::Allow,
        };
    }

    RouteDecision::Allow
}

/// A dashboard navigation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavSection {
    pub key: &'static str,
    pub label: &'static str,
    pub href: &'static str,
}

const NAV: &[(NavSection, bool)] = &[
    (NavSection { key: "overview", label: "Overview", href: "/dashboard" }, false),
    (NavSection { key: "deals", label: "Deals", href: "/dashboard/deals" }, false),
    (NavSection { key: "vendors", label: "Vendors", href: "/dashboard/vendors" }, false),
    (NavSection { key: "pipeline", label: "Pipeline", href: "/dashboard/pipeline" }, false),
    (NavSection { key: "investors", label: "Investors", href: "/dashboard/investors" }, false),
    (NavSection { key: "templates", label: "Pack templates", href: "/dashboard/templates" }, false),
    (NavSection { key: "users", label: "Users", href: "/dashboard/users" }, true),
    (NavSection { key: "settings", label: "Settings", href: "/dashboard/settings" }, true),
];

/// Navigation visible to `role`; empty for investors
pub fn nav_sections(role: UserRole) -> Vec<NavSection> {
    match role {
        UserRole::Investor => Vec::new(),
        UserRole::Sourcer => NAV
            .iter()
            .filter(|(_, admin_only)| !admin_only)
            .map(|(section, _)| section.clone())
            .collect(),
        UserRole::Admin => NAV.iter().map(|(section, _)| section.clone()).collect(),
    }
}
