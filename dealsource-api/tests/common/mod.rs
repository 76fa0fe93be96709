//! Common test utilities for API tests
//!
//! Two kinds of application are available:
//!
//! - [`lazy_app`]: the full router over a pool that never connects. Good for
//!   auth, role and validation paths that are rejected before any query.
//! - [`TestContext`]: the router over a migrated database from `DATABASE_URL`.
//!   `TestContext::new` returns `None` when the variable is unset.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Duration;
use dealsource_api::app::{build_router, AppState};
use dealsource_api::config::Config;
use dealsource_shared::auth::password::hash_password;
use dealsource_shared::auth::session::{create_token, Claims};
use dealsource_shared::db::migrations::run_migrations;
use dealsource_shared::db::pool::{create_lazy_pool, create_pool};
use dealsource_shared::models::user::{CreateUser, User, UserRole};
use dealsource_shared::notify::email::{EmailMessage, MailError, Mailer};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use tower::Service as _;
use uuid::Uuid;

pub const SECRET: &str = "test-session-secret-with-at-least-32-chars";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const PASSWORD: &str = "Correct-Horse-42";

/// Nothing listens on port 1, so an accidental query fails fast
const UNREACHABLE_DB: &str = "postgresql://dealsource@127.0.0.1:1/unused";

pub fn test_config(database_url: &str) -> Config {
    let mut config = Config::new(database_url, SECRET);
    config.sms_webhook_secret = Some(WEBHOOK_SECRET.to_string());
    config.api.image_remote_hosts = vec!["images.dealsource.test".to_string()];
    config
}

pub fn lazy_app() -> Router {
    lazy_app_with(test_config(UNREACHABLE_DB))
}

pub fn lazy_app_with(config: Config) -> Router {
    let pool = create_lazy_pool(&config.database).expect("Failed to create lazy pool");
    let state = AppState::new(pool, config).expect("Failed to build state");
    build_router(state)
}

pub fn token_for(user_id: Uuid, role: UserRole) -> String {
    let claims = Claims::new(user_id, "someone@dealsource.test", role, Duration::hours(1));
    create_token(&claims, SECRET).expect("Failed to create token")
}

pub fn token(role: UserRole) -> String {
    token_for(Uuid::new_v4(), role)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn send_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn call(app: &Router, request: Request<Body>) -> Response {
    app.clone().call(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Status and parsed JSON body (`Value::Null` for an empty body)
pub async fn call_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = call(app, request).await;
    let status = response.status();
    let bytes = body_bytes(response).await;

    if bytes.is_empty() {
        return (status, Value::Null);
    }

    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes)));
    (status, value)
}

/// Keeps every message instead of sending it
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl CapturingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Router over a migrated database
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub mailer: Arc<CapturingMailer>,
}

impl TestContext {
    pub async fn new() -> Option<Self> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set, skipping database test");
                return None;
            }
        };

        let config = test_config(&url);
        let db = create_pool(config.database.clone())
            .await
            .expect("Failed to connect to test database");
        run_migrations(&db).await.expect("Failed to run migrations");

        let mailer = Arc::new(CapturingMailer::default());
        let state = AppState::new(db.clone(), config)
            .expect("Failed to build state")
            .with_mailer(mailer.clone());

        Some(Self {
            db,
            app: build_router(state),
            mailer,
        })
    }

    /// Creates an active user with [`PASSWORD`] and returns it with a token
    pub async fn user(&self, role: UserRole, first_name: &str, last_name: &str) -> (User, String) {
        let user = User::create(
            &self.db,
            CreateUser {
                email: format!("{}-{}@dealsource.test", role, Uuid::new_v4().simple()),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role,
                password_hash: Some(hash_password(PASSWORD).unwrap()),
                is_active: true,
            },
        )
        .await
        .expect("Failed to create user");

        let token = token_for(user.id, role);
        (user, token)
    }
}
