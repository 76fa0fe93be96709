/// Cached property-data provider responses
///
/// Every uncached provider call leaves one row here with the credits it cost.
/// Monthly usage is the sum over rows created since the start of the month.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDataCacheEntry {
    pub id: Uuid,
    pub endpoint: String,
    pub query_key: String,
    pub response: JsonValue,
    pub credits_used: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Credits and request count for a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UsageTotals {
    pub credits_used: i64,
    pub requests: i64,
}

impl PropertyDataCacheEntry {
    /// Newest unexpired row for this request
    pub async fn find_fresh(
        pool: &PgPool,
        endpoint: &str,
        query_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PropertyDataCacheEntry>(
            r#"
            SELECT id, endpoint, query_key, response, credits_used, created_at, expires_at
            FROM property_data_cache
            WHERE endpoint = $1 AND query_key = $2 AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(endpoint)
        .bind(query_key)
        .fetch_optional(pool)
        .await
    }

    pub async fn record(
        pool: &PgPool,
        endpoint: &str,
        query_key: &str,
        response: &JsonValue,
        credits_used: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PropertyDataCacheEntry>(
            r#"
            INSERT INTO property_data_cache (endpoint, query_key, response, credits_used, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, endpoint, query_key, response, credits_used, created_at, expires_at
            "#,
        )
        .bind(endpoint)
        .bind(query_key)
        .bind(response)
        .bind(credits_used)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Totals over rows created at or after `since`
    pub async fn usage_since(pool: &PgPool, since: DateTime<Utc>) -> Result<UsageTotals, sqlx::Error> {
        let (credits_used, requests): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(credits_used), 0)::BIGINT, COUNT(*)
            FROM property_data_cache
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(UsageTotals {
            credits_used,
            requests,
        })
    }
}
