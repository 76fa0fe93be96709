/// Property deals
///
/// A deal moves through `draft -> review -> available -> reserved -> sold`,
/// with `withdrawn` reachable from any open status. Every status change is
/// appended to `status_history`; entries are never rewritten. The allowed
/// edges live in [`crate::workflow::deal_status`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const DEAL_COLUMNS: &str = "id, title, address, postcode, property_type, bedrooms, bathrooms, \
     asking_price, estimated_value, refurb_cost, monthly_rent, description, status, \
     status_history, created_by, assigned_to, vendor_id, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "deal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Draft,
    Review,
    Available,
    Reserved,
    Sold,
    Withdrawn,
}

impl DealStatus {
    pub const ALL: [DealStatus; 6] = [
        DealStatus::Draft,
        DealStatus::Review,
        DealStatus::Available,
        DealStatus::Reserved,
        DealStatus::Sold,
        DealStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Draft => "draft",
            DealStatus::Review => "review",
            DealStatus::Available => "available",
            DealStatus::Reserved => "reserved",
            DealStatus::Sold => "sold",
            DealStatus::Withdrawn => "withdrawn",
        }
    }

    /// Human label used in investor packs
    pub fn label(&self) -> &'static str {
        match self {
            DealStatus::Draft => "Draft",
            DealStatus::Review => "In review",
            DealStatus::Available => "Available",
            DealStatus::Reserved => "Reserved",
            DealStatus::Sold => "Sold",
            DealStatus::Withdrawn => "Withdrawn",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Sold)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DealStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown deal status: {}", s))
    }
}

/// One entry of a deal's status log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: DealStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StatusHistoryEntry {
    pub fn new(status: DealStatus, changed_by: Option<Uuid>, note: Option<String>) -> Self {
        Self {
            status,
            changed_at: Utc::now(),
            changed_by,
            note,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    pub address: String,
    pub postcode: Option<String>,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,

    /// Whole pounds
    pub asking_price: Option<i64>,
    pub estimated_value: Option<i64>,
    pub refurb_cost: Option<i64>,
    pub monthly_rent: Option<i64>,

    pub description: Option<String>,
    pub status: DealStatus,
    pub status_history: Json<Vec<StatusHistoryEntry>>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing row for the investor portal
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PortalDeal {
    pub id: Uuid,
    pub title: String,
    pub postcode: Option<String>,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub asking_price: Option<i64>,
    pub estimated_value: Option<i64>,
    pub refurb_cost: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub description: Option<String>,
    pub cover_photo_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateDeal {
    pub title: String,
    pub address: String,
    pub postcode: Option<String>,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub asking_price: Option<i64>,
    pub estimated_value: Option<i64>,
    pub refurb_cost: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
}

/// Partial update; `assigned_to: Some(None)` unassigns
#[derive(Debug, Clone, Default)]
pub struct UpdateDeal {
    pub title: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    pub property_type: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub asking_price: Option<i64>,
    pub estimated_value: Option<i64>,
    pub refurb_cost: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub description: Option<String>,
    pub assigned_to: Option<Option<Uuid>>,
    pub vendor_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub status: Option<DealStatus>,
    pub assigned_to: Option<Uuid>,
}

impl Deal {
    /// Inserts a draft deal with its first history entry
    pub async fn create(
        pool: &PgPool,
        created_by: Uuid,
        data: CreateDeal,
    ) -> Result<Self, sqlx::Error> {
        let history = vec![StatusHistoryEntry::new(
            DealStatus::Draft,
            Some(created_by),
            Some("Deal created".to_string()),
        )];

        let query = format!(
            "INSERT INTO deals (title, address, postcode, property_type, bedrooms, bathrooms,
                                asking_price, estimated_value, refurb_cost, monthly_rent,
                                description, status, status_history, created_by, assigned_to, vendor_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'draft', $12, $13, $14, $15)
             RETURNING {}",
            DEAL_COLUMNS
        );

        sqlx::query_as::<_, Deal>(&query)
            .bind(data.title)
            .bind(data.address)
            .bind(data.postcode)
            .bind(data.property_type)
            .bind(data.bedrooms)
            .bind(data.bathrooms)
            .bind(data.asking_price)
            .bind(data.estimated_value)
            .bind(data.refurb_cost)
            .bind(data.monthly_rent)
            .bind(data.description)
            .bind(Json(history))
            .bind(created_by)
            .bind(data.assigned_to)
            .bind(data.vendor_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM deals WHERE id = $1", DEAL_COLUMNS);

        sqlx::query_as::<_, Deal>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently updated first
    pub async fn list(
        pool: &PgPool,
        filter: &DealFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM deals
             WHERE ($1::deal_status IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR assigned_to = $2)
             ORDER BY updated_at DESC
             LIMIT $3 OFFSET $4",
            DEAL_COLUMNS
        );

        sqlx::query_as::<_, Deal>(&query)
            .bind(filter.status)
            .bind(filter.assigned_to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Deals investors can see, with their cover photo
    pub async fn list_available(pool: &PgPool) -> Result<Vec<PortalDeal>, sqlx::Error> {
        sqlx::query_as::<_, PortalDeal>(
            r#"
            SELECT d.id, d.title, d.postcode, d.property_type, d.bedrooms, d.bathrooms,
                   d.asking_price, d.estimated_value, d.refurb_cost, d.monthly_rent,
                   d.description, p.url AS cover_photo_url, d.updated_at
            FROM deals d
            LEFT JOIN deal_photos p ON p.deal_id = d.id AND p.is_cover
            WHERE d.status = 'available'
            ORDER BY d.updated_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateDeal,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE deals SET updated_at = NOW()");

        macro_rules! set_if_some {
            ($field:ident) => {
                if let Some(value) = data.$field {
                    qb.push(concat!(", ", stringify!($field), " = "));
                    qb.push_bind(value);
                }
            };
        }

        set_if_some!(title);
        set_if_some!(address);
        set_if_some!(postcode);
        set_if_some!(property_type);
        set_if_some!(bedrooms);
        set_if_some!(bathrooms);
        set_if_some!(asking_price);
        set_if_some!(estimated_value);
        set_if_some!(refurb_cost);
        set_if_some!(monthly_rent);
        set_if_some!(description);
        set_if_some!(assigned_to);
        set_if_some!(vendor_id);

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING ");
        qb.push(DEAL_COLUMNS);

        qb.build_query_as::<Deal>().fetch_optional(pool).await
    }

    /// Moves the deal from `from` to `entry.status` and appends `entry`
    ///
    /// Returns `None` when the deal no longer has status `from` (or no longer
    /// exists), so a concurrent change is never overwritten.
    pub async fn change_status(
        pool: &PgPool,
        id: Uuid,
        from: DealStatus,
        entry: StatusHistoryEntry,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE deals
             SET status = $3,
                 status_history = status_history || $4,
                 updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {}",
            DEAL_COLUMNS
        );

        sqlx::query_as::<_, Deal>(&query)
            .bind(id)
            .bind(from)
            .bind(entry.status)
            .bind(Json(vec![entry]))
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        for status in DealStatus::ALL {
            assert_eq!(status.to_string().parse::<DealStatus>().unwrap(), status);
        }
        assert!("archived".parse::<DealStatus>().is_err());
    }

    #[test]
    fn test_history_entry_json_shape() {
        let by = Uuid::new_v4();
        let entry = StatusHistoryEntry::new(DealStatus::Review, Some(by), None);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["status"], "review");
        assert_eq!(json["changedBy"], by.to_string());
        assert!(json.get("changedAt").is_some());
        assert!(json.get("note").is_none());

        let back: StatusHistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_update_deal_default_has_no_changes() {
        let update = UpdateDeal::default();
        assert!(update.title.is_none());
        assert!(update.assigned_to.is_none());
    }

    #[test]
    fn test_only_sold_is_terminal() {
        let terminal: Vec<_> = DealStatus::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&DealStatus::Sold]);
    }
}
