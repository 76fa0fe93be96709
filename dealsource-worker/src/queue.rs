/// Vendor contact queue
///
/// Every query here claims or moves vendors with a single conditional
/// statement. Claims use `FOR UPDATE SKIP LOCKED` so two workers never pick
/// the same vendor, and every write repeats the stage it expects; if someone
/// moved the vendor in the dashboard meanwhile, the write matches no row and
/// the worker leaves it alone.
///
/// # Flow
///
/// ```text
/// new_lead --claim_new_leads--> contacted --claim_follow_ups--> contacted
///    ^                              |                              |
///    +------release_failed----------+            give_up ----> unresponsive
/// ```
///
/// All methods take `now` explicitly so the timing rules can be exercised
/// without waiting.

use chrono::{DateTime, Duration, Utc};
use dealsource_shared::models::vendor::{PipelineStage, SmsStatus, Vendor, VENDOR_COLUMNS};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Cutoffs for the follow-up and give-up steps
#[derive(Debug, Clone, Copy)]
pub struct FollowUpRule {
    pub quiet_period: Duration,
    pub max_follow_ups: i32,
}

pub struct VendorQueue {
    db: PgPool,
}

impl VendorQueue {
    pub fn new(db: PgPool) -> Self {
        VendorQueue { db }
    }

    /// Claims due `new_lead` vendors and moves them to `contacted`
    ///
    /// Due means: a phone number, not opted out, `next_contact_at` reached.
    /// Most urgent first, then longest waiting.
    pub async fn claim_new_leads(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Vendor>, QueueError> {
        let query = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM vendors
                WHERE stage = $1
                  AND phone IS NOT NULL
                  AND NOT sms_opt_out
                  AND next_contact_at IS NOT NULL
                  AND next_contact_at <= $3
                ORDER BY urgency DESC, next_contact_at ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            UPDATE vendors
            SET stage = $2,
                last_contacted_at = $3,
                next_contact_at = NULL,
                follow_up_count = 0,
                sms_direction = 'outbound',
                sms_status = 'pending',
                updated_at = NOW()
            WHERE id IN (SELECT id FROM due) AND stage = $1
            RETURNING {}
            "#,
            VENDOR_COLUMNS
        );

        let vendors = sqlx::query_as::<_, Vendor>(&query)
            .bind(PipelineStage::NewLead)
            .bind(PipelineStage::Contacted)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        if !vendors.is_empty() {
            tracing::info!(count = vendors.len(), "Claimed new leads");
        }

        Ok(vendors)
    }

    /// Puts a vendor whose first message failed back in the queue
    ///
    /// Returns `false` when the vendor is no longer in `contacted`.
    pub async fn release_failed(
        &self,
        vendor_id: Uuid,
        retry_at: DateTime<Utc>,
    ) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE vendors
            SET stage = $2,
                next_contact_at = $3,
                last_contacted_at = NULL,
                sms_status = $4,
                updated_at = NOW()
            WHERE id = $1 AND stage = $5
            "#,
        )
        .bind(vendor_id)
        .bind(PipelineStage::NewLead)
        .bind(retry_at)
        .bind(SmsStatus::Failed)
        .bind(PipelineStage::Contacted)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Claims `contacted` vendors due a follow-up and counts the attempt
    ///
    /// Due means: no reply since the last contact, the last contact older
    /// than the quiet period, fewer than `max_follow_ups` sent so far.
    pub async fn claim_follow_ups(
        &self,
        rule: FollowUpRule,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Vendor>, QueueError> {
        let query = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM vendors
                WHERE stage = $1
                  AND phone IS NOT NULL
                  AND NOT sms_opt_out
                  AND (last_inbound_at IS NULL OR last_inbound_at < last_contacted_at)
                  AND last_contacted_at < $2
                  AND follow_up_count < $3
                ORDER BY last_contacted_at ASC
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            UPDATE vendors
            SET follow_up_count = follow_up_count + 1,
                last_contacted_at = $5,
                sms_direction = 'outbound',
                sms_status = 'pending',
                updated_at = NOW()
            WHERE id IN (SELECT id FROM due) AND stage = $1
            RETURNING {}
            "#,
            VENDOR_COLUMNS
        );

        let vendors = sqlx::query_as::<_, Vendor>(&query)
            .bind(PipelineStage::Contacted)
            .bind(now - rule.quiet_period)
            .bind(rule.max_follow_ups)
            .bind(limit)
            .bind(now)
            .fetch_all(&self.db)
            .await?;

        if !vendors.is_empty() {
            tracing::info!(count = vendors.len(), "Claimed follow-ups");
        }

        Ok(vendors)
    }

    /// Moves silent vendors with no follow-ups left to `unresponsive`
    ///
    /// Returns the ids that moved.
    pub async fn give_up(
        &self,
        rule: FollowUpRule,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, QueueError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            WITH exhausted AS (
                SELECT id
                FROM vendors
                WHERE stage = $1
                  AND (last_inbound_at IS NULL OR last_inbound_at < last_contacted_at)
                  AND last_contacted_at < $3
                  AND follow_up_count >= $4
                ORDER BY last_contacted_at ASC
                LIMIT $5
                FOR UPDATE SKIP LOCKED
            )
            UPDATE vendors
            SET stage = $2,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM exhausted) AND stage = $1
            RETURNING id
            "#,
        )
        .bind(PipelineStage::Contacted)
        .bind(PipelineStage::Unresponsive)
        .bind(now - rule.quiet_period)
        .bind(rule.max_follow_ups)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.into_iter().map(|(id,)| id).collect();
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "Vendors marked unresponsive");
        }

        Ok(ids)
    }

    /// Records the gateway outcome of the last outbound message
    ///
    /// Only touches vendors still in `contacted`.
    pub async fn record_delivery(
        &self,
        vendor_id: Uuid,
        status: SmsStatus,
    ) -> Result<bool, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE vendors
            SET sms_status = $2, updated_at = NOW()
            WHERE id = $1 AND stage = $3
            "#,
        )
        .bind(vendor_id)
        .bind(status)
        .bind(PipelineStage::Contacted)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
