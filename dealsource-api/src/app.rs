/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use dealsource_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = dealsource_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{page_gate::page_gate, security::SecurityHeadersLayer},
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use dealsource_shared::{
    auth::middleware::create_session_middleware,
    notify::email::{Mailer, SmtpMailer},
    property_data::PropertyDataClient,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Outgoing mail (password reset)
    pub mailer: Arc<dyn Mailer>,

    /// Property-data provider client
    pub property_data: PropertyDataClient,
}

impl AppState {
    /// Creates application state with the SMTP mailer from `config.email`
    pub fn new(db: PgPool, config: Config) -> anyhow::Result<Self> {
        let mailer = SmtpMailer::new(config.email.clone());
        if !mailer.is_enabled() {
            tracing::warn!("SMTP is not configured; password reset emails will be skipped");
        }

        let property_data = PropertyDataClient::new(config.property_data.clone())?;

        Ok(Self {
            db,
            config: Arc::new(config),
            mailer: Arc::new(mailer),
            property_data,
        })
    }

    /// Replaces the mailer, e.g. with a capturing one in tests
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn session_secret(&self) -> &str {
        &self.config.session.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                              public
/// ├── /login, /dashboard, /dashboard/*     page gate (redirects)
/// └── /api/
///     ├── auth/login|logout|forgot-password|reset-password   public
///     ├── webhooks/sms                     shared secret
///     └── everything else                  session required, roles per handler
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost last):
/// 1. Session / page gate (per route group)
/// 2. Logging (tower-http TraceLayer)
/// 3. Response compression, gzip or brotli per `Accept-Encoding`
/// 4. CORS (tower-http CorsLayer)
/// 5. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let page_routes = Router::new()
        .route("/login", get(routes::dashboard::login_page))
        .route("/dashboard", get(routes::dashboard::dashboard_shell))
        .route("/dashboard/*path", get(routes::dashboard::dashboard_shell))
        .layer(middleware::from_fn_with_state(state.clone(), page_gate));

    let public_api = Router::new()
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/forgot-password", post(routes::auth::forgot_password))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        .route("/webhooks/sms", post(routes::webhooks::inbound_sms));

    let session_api = Router::new()
        .route("/auth/session", get(routes::auth::session))
        // deals
        .route("/deals", get(routes::deals::list_deals).post(routes::deals::create_deal))
        .route("/deals/:id", get(routes::deals::get_deal).patch(routes::deals::update_deal))
        .route("/deals/:id/status", post(routes::deals::change_status))
        .route(
            "/deals/:id/photos",
            get(routes::photos::list_photos).post(routes::photos::add_photo),
        )
        .route(
            "/deals/:id/photos/:photo_id",
            axum::routing::delete(routes::photos::delete_photo),
        )
        .route("/deals/:id/photos/:photo_id/cover", put(routes::photos::set_cover))
        .route("/deals/:id/investor-pack", get(routes::investor_pack::generate))
        .route("/portal/deals", get(routes::portal::list_available))
        // vendors
        .route("/vendors", get(routes::vendors::list_vendors).post(routes::vendors::create_vendor))
        .route(
            "/vendors/:id",
            get(routes::vendors::get_vendor).patch(routes::vendors::update_vendor),
        )
        .route("/vendors/:id/stage", put(routes::vendors::change_stage))
        .route("/vendors/:id/messages", get(routes::vendors::list_messages))
        // investors
        .route(
            "/investors",
            get(routes::investors::list_investors).post(routes::investors::create_investor),
        )
        .route(
            "/investors/:id",
            get(routes::investors::get_investor).patch(routes::investors::update_investor),
        )
        // templates
        .route(
            "/investor-pack-templates",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route(
            "/investor-pack-templates/:id",
            patch(routes::templates::update_template).delete(routes::templates::delete_template),
        )
        .route(
            "/investor-pack-templates/:id/set-default",
            post(routes::templates::set_default),
        )
        // property data
        .route("/propertydata/usage", get(routes::property_data::usage))
        .route("/propertydata/:endpoint", get(routes::property_data::lookup))
        // users
        .route("/users", get(routes::users::list_users).post(routes::users::create_user))
        .route("/users/team", get(routes::users::team))
        .route("/users/me", get(routes::users::me).patch(routes::users::update_me))
        .route("/users/:id", patch(routes::users::update_user))
        .layer(middleware::from_fn(create_session_middleware(
            state.config.session.secret.clone(),
        )));

    let api_routes = Router::new().merge(public_api).merge(session_api);

    Router::new()
        .merge(health_routes)
        .merge(page_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// `*` in `CORS_ORIGINS` gives a permissive layer for local development;
/// otherwise only the listed origins may send credentialed requests
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
