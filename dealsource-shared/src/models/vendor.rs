/// Vendors (property sellers) and their SMS pipeline state
///
/// The background pipeline service and the inbound SMS webhook both move
/// vendors between stages. Every automated move is a conditional update on
/// the stage it expects, so edits made in the dashboard are never clobbered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const VENDOR_COLUMNS: &str = "id, first_name, last_name, phone, email, property_address, \
     postcode, urgency, property_condition, reason_for_sale, asking_price, stage, sms_direction, \
     sms_status, last_contacted_at, last_inbound_at, follow_up_count, next_contact_at, sms_opt_out, \
     notes, created_by, assigned_to, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pipeline_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    NewLead,
    Contacted,
    Responded,
    Qualified,
    ViewingBooked,
    OfferMade,
    UnderOffer,
    Completed,
    Unresponsive,
    Lost,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 10] = [
        PipelineStage::NewLead,
        PipelineStage::Contacted,
        PipelineStage::Responded,
        PipelineStage::Qualified,
        PipelineStage::ViewingBooked,
        PipelineStage::OfferMade,
        PipelineStage::UnderOffer,
        PipelineStage::Completed,
        PipelineStage::Unresponsive,
        PipelineStage::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::NewLead => "new_lead",
            PipelineStage::Contacted => "contacted",
            PipelineStage::Responded => "responded",
            PipelineStage::Qualified => "qualified",
            PipelineStage::ViewingBooked => "viewing_booked",
            PipelineStage::OfferMade => "offer_made",
            PipelineStage::UnderOffer => "under_offer",
            PipelineStage::Completed => "completed",
            PipelineStage::Unresponsive => "unresponsive",
            PipelineStage::Lost => "lost",
        }
    }

    /// Stages the pipeline no longer works on without a person reopening them
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            PipelineStage::Completed | PipelineStage::Unresponsive | PipelineStage::Lost
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("Unknown pipeline stage: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vendor_urgency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VendorUrgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_condition", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PropertyCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Derelict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sms_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SmsDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sms_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SmsStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Received,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,

    /// E.164, normalized on write
    pub phone: Option<String>,
    pub email: Option<String>,
    pub property_address: String,
    pub postcode: Option<String>,
    pub urgency: VendorUrgency,
    pub property_condition: Option<PropertyCondition>,
    pub reason_for_sale: Option<String>,
    pub asking_price: Option<i64>,
    pub stage: PipelineStage,

    // last SMS exchanged
    pub sms_direction: Option<SmsDirection>,
    pub sms_status: Option<SmsStatus>,

    pub last_contacted_at: Option<DateTime<Utc>>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub follow_up_count: i32,
    pub next_contact_at: Option<DateTime<Utc>>,
    pub sms_opt_out: bool,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateVendor {
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub property_address: String,
    pub postcode: Option<String>,
    pub urgency: VendorUrgency,
    pub property_condition: Option<PropertyCondition>,
    pub reason_for_sale: Option<String>,
    pub asking_price: Option<i64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateVendor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub property_address: Option<String>,
    pub postcode: Option<String>,
    pub urgency: Option<VendorUrgency>,
    pub property_condition: Option<PropertyCondition>,
    pub reason_for_sale: Option<String>,
    pub asking_price: Option<i64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Option<Uuid>>,
}

/// Inbound reply bookkeeping
#[derive(Debug, Clone)]
pub struct InboundReply {
    pub opt_out: bool,
    /// Stages a reply moves to `responded`
    pub advance_from: Vec<PipelineStage>,
}

impl Vendor {
    pub async fn create(
        pool: &PgPool,
        created_by: Option<Uuid>,
        data: CreateVendor,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO vendors (first_name, last_name, phone, email, property_address, postcode,
                                  urgency, property_condition, reason_for_sale, asking_price, notes,
                                  created_by, assigned_to, next_contact_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW())
             RETURNING {}",
            VENDOR_COLUMNS
        );

        sqlx::query_as::<_, Vendor>(&query)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone)
            .bind(data.email)
            .bind(data.property_address)
            .bind(data.postcode)
            .bind(data.urgency)
            .bind(data.property_condition)
            .bind(data.reason_for_sale)
            .bind(data.asking_price)
            .bind(data.notes)
            .bind(created_by)
            .bind(data.assigned_to)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM vendors WHERE id = $1", VENDOR_COLUMNS);

        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently created vendor with this normalized number
    pub async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM vendors WHERE phone = $1 ORDER BY created_at DESC LIMIT 1",
            VENDOR_COLUMNS
        );

        sqlx::query_as::<_, Vendor>(&query)
            .bind(phone)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        stage: Option<PipelineStage>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM vendors
             WHERE ($1::pipeline_stage IS NULL OR stage = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
            VENDOR_COLUMNS
        );

        sqlx::query_as::<_, Vendor>(&query)
            .bind(stage)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateVendor,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE vendors SET updated_at = NOW()");

        macro_rules! set_if_some {
            ($field:ident) => {
                if let Some(value) = data.$field {
                    qb.push(concat!(", ", stringify!($field), " = "));
                    qb.push_bind(value);
                }
            };
        }

        set_if_some!(first_name);
        set_if_some!(last_name);
        set_if_some!(phone);
        set_if_some!(email);
        set_if_some!(property_address);
        set_if_some!(postcode);
        set_if_some!(urgency);
        set_if_some!(property_condition);
        set_if_some!(reason_for_sale);
        set_if_some!(asking_price);
        set_if_some!(notes);
        set_if_some!(assigned_to);

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING ");
        qb.push(VENDOR_COLUMNS);

        qb.build_query_as::<Vendor>().fetch_optional(pool).await
    }

    /// Moves a vendor from `from` to `to`; `None` if the stage had changed
    ///
    /// Moving back to `new_lead` restarts the contact cycle.
    pub async fn set_stage(
        pool: &PgPool,
        id: Uuid,
        from: PipelineStage,
        to: PipelineStage,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE vendors
             SET stage = $3,
                 follow_up_count = CASE WHEN $3 = 'new_lead'::pipeline_stage THEN 0 ELSE follow_up_count END,
                 next_contact_at = CASE WHEN $3 = 'new_lead'::pipeline_stage THEN NOW() ELSE next_contact_at END,
                 updated_at = NOW()
             WHERE id = $1 AND stage = $2
             RETURNING {}",
            VENDOR_COLUMNS
        );

        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(pool)
            .await
    }

    /// Records an inbound SMS in one statement
    ///
    /// Sets `last_inbound_at`, latches the opt-out flag, and moves the vendor
    /// to `responded` if it is currently in one of `reply.advance_from`.
    pub async fn record_inbound(
        pool: &PgPool,
        id: Uuid,
        reply: &InboundReply,
    ) -> Result<Option<Self>, sqlx::Error> {
        let advance_from: Vec<String> = reply
            .advance_from
            .iter()
            .map(|stage| stage.as_str().to_string())
            .collect();

        let query = format!(
            "UPDATE vendors
             SET last_inbound_at = NOW(),
                 sms_direction = 'inbound',
                 sms_status = 'received',
                 sms_opt_out = sms_opt_out OR $2,
                 stage = CASE WHEN stage::text = ANY($3::text[]) THEN 'responded'::pipeline_stage ELSE stage END,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            VENDOR_COLUMNS
        );

        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .bind(reply.opt_out)
            .bind(advance_from)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_round_trip() {
        for stage in PipelineStage::ALL {
            assert_eq!(stage.as_str().parse::<PipelineStage>().unwrap(), stage);
            assert_eq!(
                serde_json::to_value(stage).unwrap(),
                serde_json::Value::String(stage.as_str().to_string())
            );
        }
        assert!("archived".parse::<PipelineStage>().is_err());
    }

    #[test]
    fn test_closed_stages() {
        assert!(PipelineStage::Lost.is_closed());
        assert!(PipelineStage::Unresponsive.is_closed());
        assert!(PipelineStage::Completed.is_closed());
        assert!(!PipelineStage::Contacted.is_closed());
    }

    #[test]
    fn test_urgency_json() {
        let urgency: VendorUrgency = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(urgency, VendorUrgency::Critical);
    }
}
