/// Per-vendor SMS log
///
/// Append-only: outbound messages written by the pipeline worker, inbound
/// replies written by the SMS webhook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::vendor::{SmsDirection, SmsStatus};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub direction: SmsDirection,
    pub body: String,
    pub status: SmsStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSmsMessage {
    pub vendor_id: Uuid,
    pub direction: SmsDirection,
    pub body: String,
    pub status: SmsStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl SmsMessage {
    pub async fn create(pool: &PgPool, data: NewSmsMessage) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SmsMessage>(
            r#"
            INSERT INTO sms_messages (vendor_id, direction, body, status, provider_message_id, error)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, vendor_id, direction, body, status, provider_message_id, error, created_at
            "#,
        )
        .bind(data.vendor_id)
        .bind(data.direction)
        .bind(data.body)
        .bind(data.status)
        .bind(data.provider_message_id)
        .bind(data.error)
        .fetch_one(pool)
        .await
    }

    /// Oldest first
    pub async fn list_for_vendor(pool: &PgPool, vendor_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SmsMessage>(
            r#"
            SELECT id, vendor_id, direction, body, status, provider_message_id, error, created_at
            FROM sms_messages
            WHERE vendor_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(vendor_id)
        .fetch_all(pool)
        .await
    }
}
