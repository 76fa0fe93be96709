/// Configuration management for the API server
///
/// This module loads configuration from environment variables (and a `.env`
/// file in development) into a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `SESSION_SECRET`: session signing key, at least 32 characters; falls
///   back to `NEXTAUTH_SECRET`
/// - `SESSION_MAX_AGE_DAYS`: session lifetime (default: 30)
/// - `APP_BASE_URL`: public URL used in emailed links
/// - `CORS_ORIGINS`: comma-separated allowed origins, `*` for any
/// - `IMAGE_REMOTE_HOSTS`: comma-separated hosts deal photos may point at
/// - `PRODUCTION`: enables HSTS and secure cookies
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_TLS`,
///   `SMTP_FROM`, `SMTP_FROM_NAME`: outgoing mail
/// - `PROPERTYDATA_API_KEY`, `PROPERTYDATA_BASE_URL`,
///   `PROPERTYDATA_MONTHLY_LIMIT`, `PROPERTYDATA_CACHE_TTL_HOURS`
/// - `SMS_WEBHOOK_SECRET`: shared secret for inbound SMS callbacks
/// - `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_FIRST_NAME`, `ADMIN_LAST_NAME`:
///   bootstrap admin account
///
/// # Example
///
/// ```no_run
/// use dealsource_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use dealsource_shared::auth::session::{DEFAULT_MAX_AGE_DAYS, MIN_SECRET_LENGTH};
use dealsource_shared::db::pool::DatabaseConfig;
use dealsource_shared::notify::email::EmailConfig;
use dealsource_shared::property_data::PropertyDataConfig;
use dealsource_shared::seed::AdminSeed;
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub email: EmailConfig,
    pub property_data: PropertyDataConfig,
    /// Shared secret expected in `X-Webhook-Secret` on inbound SMS
    pub sms_webhook_secret: Option<String>,
    pub admin_seed: Option<AdminSeed>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Public base URL of the web app, without trailing slash
    pub base_url: String,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Hosts deal photo URLs may point at; empty allows any https host
    pub image_remote_hosts: Vec<String>,

    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Signing key for session tokens
    ///
    /// Must be at least 32 characters. Generate with `openssl rand -hex 32`.
    pub secret: String,
    pub max_age_days: i64,
}

impl SessionConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.max_age_days)
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e)),
        None => Ok(default),
    }
}

fn list_var(name: &str) -> Vec<String> {
    var(name)
        .map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    /// Configuration with development defaults for everything optional
    pub fn new(database_url: impl Into<String>, session_secret: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                base_url: "http://localhost:3000".to_string(),
                cors_origins: vec!["http://localhost:3000".to_string()],
                image_remote_hosts: Vec::new(),
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.into(),
                ..Default::default()
            },
            session: SessionConfig {
                secret: session_secret.into(),
                max_age_days: DEFAULT_MAX_AGE_DAYS,
            },
            email: EmailConfig::default(),
            property_data: PropertyDataConfig::default(),
            sms_webhook_secret: None,
            admin_seed: None,
        }
    }

    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or the session secret is missing
    /// - the session secret is shorter than 32 characters
    /// - a numeric or boolean variable does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database = DatabaseConfig::from_env()?;

        let secret = var("SESSION_SECRET")
            .or_else(|| var("NEXTAUTH_SECRET"))
            .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET environment variable is required"))?;

        if secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("SESSION_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }

        let mut config = Self::new(database.url.clone(), secret);
        config.database = database;

        config.api.host = var("API_HOST").unwrap_or(config.api.host);
        config.api.port = parse_var("API_PORT", config.api.port)?;
        if let Some(base_url) = var("APP_BASE_URL") {
            config.api.base_url = base_url.trim_end_matches('/').to_string();
        }
        let origins = list_var("CORS_ORIGINS");
        if !origins.is_empty() {
            config.api.cors_origins = origins;
        }
        config.api.image_remote_hosts = list_var("IMAGE_REMOTE_HOSTS");
        config.api.production = parse_var("PRODUCTION", false)?;

        config.session.max_age_days = parse_var("SESSION_MAX_AGE_DAYS", DEFAULT_MAX_AGE_DAYS)?;
        if config.session.max_age_days <= 0 {
            anyhow::bail!("SESSION_MAX_AGE_DAYS must be positive");
        }

        config.email = EmailConfig {
            smtp_host: var("SMTP_HOST"),
            smtp_port: parse_var("SMTP_PORT", config.email.smtp_port)?,
            smtp_username: var("SMTP_USERNAME"),
            smtp_password: var("SMTP_PASSWORD"),
            smtp_tls: parse_var("SMTP_TLS", config.email.smtp_tls)?,
            from_address: var("SMTP_FROM"),
            from_name: var("SMTP_FROM_NAME").unwrap_or(config.email.from_name),
        };

        config.property_data = PropertyDataConfig {
            api_key: var("PROPERTYDATA_API_KEY"),
            base_url: var("PROPERTYDATA_BASE_URL").unwrap_or(config.property_data.base_url),
            monthly_limit: parse_var("PROPERTYDATA_MONTHLY_LIMIT", config.property_data.monthly_limit)?,
            cache_ttl_hours: parse_var("PROPERTYDATA_CACHE_TTL_HOURS", config.property_data.cache_ttl_hours)?,
            timeout_seconds: config.property_data.timeout_seconds,
        };

        config.sms_webhook_secret = var("SMS_WEBHOOK_SECRET");

        config.admin_seed = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                first_name: var("ADMIN_FIRST_NAME").unwrap_or_else(|| "Admin".to_string()),
                last_name: var("ADMIN_LAST_NAME").unwrap_or_else(|| "User".to_string()),
            }),
            _ => None,
        };

        Ok(config)
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let mut config = Config::new(
            "postgresql://localhost/test",
            "test-secret-key-at-least-32-bytes-long",
        );
        config.api.host = "127.0.0.1".to_string();
        config.api.port = 9090;

        assert_eq!(config.bind_address(), "127.0.0.1:9090");
    }

    #[test]
    fn test_defaults() {
        let config = Config::new("postgresql://localhost/test", "s".repeat(32));

        assert_eq!(config.session.max_age_days, 30);
        assert_eq!(config.session.max_age(), chrono::Duration::days(30));
        assert_eq!(config.property_data.monthly_limit, 2000);
        assert!(!config.api.production);
        assert!(config.admin_seed.is_none());
        assert!(config.api.image_remote_hosts.is_empty());
    }
}
