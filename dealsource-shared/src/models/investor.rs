/// Investor relationship records
///
/// Separate from user accounts: an investor record may optionally be linked
/// to the `investor` user who signs in to the portal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const INVESTOR_COLUMNS: &str = "id, first_name, last_name, email, phone, company, min_budget, \
     max_budget, preferred_areas, notes, user_id, is_active, created_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Investor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub min_budget: Option<i64>,
    pub max_budget: Option<i64>,
    pub preferred_areas: Vec<String>,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateInvestor {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub min_budget: Option<i64>,
    pub max_budget: Option<i64>,
    pub preferred_areas: Vec<String>,
    pub notes: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateInvestor {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub min_budget: Option<i64>,
    pub max_budget: Option<i64>,
    pub preferred_areas: Option<Vec<String>>,
    pub notes: Option<String>,
    pub user_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

/// Budget bounds must be ordered when both are present
pub fn budget_range_is_valid(min: Option<i64>, max: Option<i64>) -> bool {
    match (min, max) {
        (Some(min), Some(max)) => min <= max,
        _ => true,
    }
}

impl Investor {
    pub async fn create(
        pool: &PgPool,
        created_by: Uuid,
        data: CreateInvestor,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO investors (first_name, last_name, email, phone, company, min_budget,
                                    max_budget, preferred_areas, notes, user_id, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {}",
            INVESTOR_COLUMNS
        );

        sqlx::query_as::<_, Investor>(&query)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.email)
            .bind(data.phone)
            .bind(data.company)
            .bind(data.min_budget)
            .bind(data.max_budget)
            .bind(data.preferred_areas)
            .bind(data.notes)
            .bind(data.user_id)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM investors WHERE id = $1", INVESTOR_COLUMNS);

        sqlx::query_as::<_, Investor>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Ordered by last name; inactive records only when asked for
    pub async fn list(
        pool: &PgPool,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM investors
             WHERE ($1 OR is_active)
             ORDER BY last_name ASC, first_name ASC
             LIMIT $2 OFFSET $3",
            INVESTOR_COLUMNS
        );

        sqlx::query_as::<_, Investor>(&query)
            .bind(include_inactive)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateInvestor,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE investors SET updated_at = NOW()");

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
        set_if_some!(email);
        set_if_some!(phone);
        set_if_some!(company);
        set_if_some!(min_budget);
        set_if_some!(max_budget);
        set_if_some!(preferred_areas);
        set_if_some!(notes);
        set_if_some!(user_id);
        set_if_some!(is_active);

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING ");
        qb.push(INVESTOR_COLUMNS);

        qb.build_query_as::<Investor>().fetch_optional(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_range() {
        assert!(budget_range_is_valid(None, None));
        assert!(budget_range_is_valid(Some(100_000), None));
        assert!(budget_range_is_valid(Some(100_000), Some(100_000)));
        assert!(!budget_range_is_valid(Some(250_000), Some(100_000)));
    }
}
