/// Property-data provider client and monthly credit metering
///
/// Each uncached provider call costs one credit and is recorded in
/// `property_data_cache`. Usage for the current calendar month is summed from
/// those rows and compared against a fixed monthly limit; nothing blocks a
/// request once the limit is reached, the figure is informational.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::models::property_data_cache::{PropertyDataCacheEntry, UsageTotals};

pub const DEFAULT_MONTHLY_LIMIT: i64 = 2000;
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;
pub const DEFAULT_BASE_URL: &str = "https://api.propertydata.co.uk";
const CREDITS_PER_REQUEST: i32 = 1;

/// Provider endpoints the API is allowed to proxy
pub const ENDPOINTS: &[&str] = &[
    "prices",
    "prices-per-sqf",
    "rents",
    "yields",
    "sold-prices",
    "demand",
    "growth",
    "postcode-key-stats",
    "flood-risk",
];

#[derive(Debug, thiserror::Error)]
pub enum PropertyDataError {
    #[error("Unknown property data endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Invalid postcode")]
    InvalidPostcode,

    #[error("Property data provider is not configured")]
    NotConfigured,

    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}")]
    Provider { status: u16 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Credit usage for the current month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub credits_used: i64,
    pub credits_remaining: i64,
    pub requests_this_month: i64,
    pub limit: i64,
}

impl UsageSummary {
    pub fn from_totals(totals: UsageTotals, limit: i64) -> Self {
        Self {
            credits_used: totals.credits_used,
            credits_remaining: (limit - totals.credits_used).max(0),
            requests_this_month: totals.requests,
            limit,
        }
    }
}

/// Midnight UTC on the first day of `now`'s month
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub async fn usage(pool: &PgPool, limit: i64, now: DateTime<Utc>) -> Result<UsageSummary, sqlx::Error> {
    let totals = PropertyDataCacheEntry::usage_since(pool, start_of_month(now)).await?;
    Ok(UsageSummary::from_totals(totals, limit))
}

/// Upper-cased postcode without spaces, used as the cache key
pub fn normalize_postcode(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let valid = (5..=7).contains(&compact.len())
        && compact.chars().all(|c| c.is_ascii_alphanumeric())
        && compact.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && compact.chars().last().is_some_and(|c| c.is_ascii_alphabetic());

    valid.then_some(compact)
}

#[derive(Debug, Clone)]
pub struct PropertyDataConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub monthly_limit: i64,
    pub cache_ttl_hours: i64,
    pub timeout_seconds: u64,
}

impl Default for PropertyDataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            monthly_limit: DEFAULT_MONTHLY_LIMIT,
            cache_ttl_hours: DEFAULT_CACHE_TTL_HOURS,
            timeout_seconds: 20,
        }
    }
}

/// Where a lookup was answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Provider,
}

#[derive(Debug, Clone)]
pub struct Lookup {
    pub source: Source,
    pub data: JsonValue,
}

#[derive(Clone)]
pub struct PropertyDataClient {
    http: reqwest::Client,
    config: PropertyDataConfig,
}

impl PropertyDataClient {
    pub fn new(config: PropertyDataConfig) -> Result<Self, PropertyDataError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &PropertyDataConfig {
        &self.config
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Answers from a fresh cache row, or calls the provider and records
    /// the response together with the credit it cost
    pub async fn fetch(
        &self,
        pool: &PgPool,
        endpoint: &str,
        postcode: &str,
    ) -> Result<Lookup, PropertyDataError> {
        if !ENDPOINTS.contains(&endpoint) {
            return Err(PropertyDataError::UnknownEndpoint(endpoint.to_string()));
        }
        let postcode = normalize_postcode(postcode).ok_or(PropertyDataError::InvalidPostcode)?;

        if let Some(hit) = PropertyDataCacheEntry::find_fresh(pool, endpoint, &postcode).await? {
            tracing::debug!(endpoint, postcode = %postcode, "Property data cache hit");
            return Ok(Lookup {
                source: Source::Cache,
                data: hit.response,
            });
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(PropertyDataError::NotConfigured)?;

        let response = self
            .http
            .get(self.endpoint_url(endpoint))
            .query(&[("key", api_key), ("postcode", postcode.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "Property data provider rejected request");
            return Err(PropertyDataError::Provider {
                status: status.as_u16(),
            });
        }

        let data: JsonValue = response.json().await?;
        let expires_at = Utc::now() + Duration::hours(self.config.cache_ttl_hours);

        PropertyDataCacheEntry::record(pool, endpoint, &postcode, &data, CREDITS_PER_REQUEST, expires_at)
            .await?;

        tracing::info!(endpoint, postcode = %postcode, "Property data fetched from provider");

        Ok(Lookup {
            source: Source::Provider,
            data,
        })
    }
}
