/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Sign-in, sign-out, session and password reset
/// - `dashboard`: Page-gated dashboard shell and login page
/// - `deals`, `photos`, `investor_pack`, `portal`: deals and what hangs off them
/// - `vendors`, `webhooks`: vendor pipeline and inbound SMS
/// - `investors`, `templates`: investor records and pack templates
/// - `property_data`: provider proxy and usage
/// - `users`: team list, profile and user management

pub mod auth;
pub mod dashboard;
pub mod deals;
pub mod health;
pub mod investor_pack;
pub mod investors;
pub mod photos;
pub mod portal;
pub mod property_data;
pub mod templates;
pub mod users;
pub mod vendors;
pub mod webhooks;

use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// `?limit=&offset=` query parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Limit clamped to 1..=200 (default 50) and a non-negative offset
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
