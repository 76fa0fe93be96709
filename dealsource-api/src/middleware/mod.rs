/// Middleware modules for the API server
///
/// - `security`: OWASP security headers on every response
/// - `page_gate`: role-based redirects for dashboard and login pages

pub mod page_gate;
pub mod security;
