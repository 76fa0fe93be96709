/// Investor pack templates
///
/// A template controls the branding text and the order of sections in a
/// generated pack. At most one template is the default; that rule is held by
/// the `uq_investor_pack_templates_one_default` index and by serializing every
/// default change on a transaction-scoped advisory lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const TEMPLATE_COLUMNS: &str = "id, name, description, company_name, intro_text, footer_text, \
     sections, is_default, created_by, created_at, updated_at";

/// Advisory lock key guarding the default flag
const DEFAULT_TEMPLATE_LOCK: i64 = 7_311_942_001;

/// A block of an investor pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackSectionKind {
    Overview,
    PropertyDetails,
    Financials,
    Description,
    Photos,
    Contact,
}

impl PackSectionKind {
    /// Section order used when a template lists none
    pub const DEFAULT_ORDER: [PackSectionKind; 6] = [
        PackSectionKind::Overview,
        PackSectionKind::PropertyDetails,
        PackSectionKind::Financials,
        PackSectionKind::Description,
        PackSectionKind::Photos,
        PackSectionKind::Contact,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            PackSectionKind::Overview => "Overview",
            PackSectionKind::PropertyDetails => "Property details",
            PackSectionKind::Financials => "Financials",
            PackSectionKind::Description => "Description",
            PackSectionKind::Photos => "Photos",
            PackSectionKind::Contact => "Contact",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvestorPackTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub intro_text: Option<String>,
    pub footer_text: Option<String>,
    pub sections: Json<Vec<PackSectionKind>>,
    pub is_default: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTemplate {
    pub name: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub intro_text: Option<String>,
    pub footer_text: Option<String>,
    pub sections: Vec<PackSectionKind>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub intro_text: Option<String>,
    pub footer_text: Option<String>,
    pub sections: Option<Vec<PackSectionKind>>,
}

async fn lock_default(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(DEFAULT_TEMPLATE_LOCK)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

impl InvestorPackTemplate {
    /// Inserts a template; with `is_default` it takes over the default flag
    pub async fn create(
        pool: &PgPool,
        created_by: Uuid,
        data: CreateTemplate,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if data.is_default {
            lock_default(&mut tx).await?;
            sqlx::query("UPDATE investor_pack_templates SET is_default = FALSE, updated_at = NOW() WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }

        let query = format!(
            "INSERT INTO investor_pack_templates
                 (name, description, company_name, intro_text, footer_text, sections, is_default, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            TEMPLATE_COLUMNS
        );

        let template = sqlx::query_as::<_, InvestorPackTemplate>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.company_name)
            .bind(data.intro_text)
            .bind(data.footer_text)
            .bind(Json(data.sections))
            .bind(data.is_default)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(template)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM investor_pack_templates WHERE id = $1",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, InvestorPackTemplate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_default(pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM investor_pack_templates WHERE is_default LIMIT 1",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, InvestorPackTemplate>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Default first, then by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM investor_pack_templates ORDER BY is_default DESC, name ASC",
            TEMPLATE_COLUMNS
        );

        sqlx::query_as::<_, InvestorPackTemplate>(&query)
            .fetch_all(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTemplate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE investor_pack_templates SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(company_name) = data.company_name {
            qb.push(", company_name = ").push_bind(company_name);
        }
        if let Some(intro_text) = data.intro_text {
            qb.push(", intro_text = ").push_bind(intro_text);
        }
        if let Some(footer_text) = data.footer_text {
            qb.push(", footer_text = ").push_bind(footer_text);
        }
        if let Some(sections) = data.sections {
            qb.push(", sections = ").push_bind(Json(sections));
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(TEMPLATE_COLUMNS);

        qb.build_query_as::<InvestorPackTemplate>()
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM investor_pack_templates WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Makes `id` the only default template
    ///
    /// Returns `None`, with no flag changed, if the template does not exist.
    pub async fn set_default(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        lock_default(&mut tx).await?;

        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM investor_pack_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query(
            "UPDATE investor_pack_templates SET is_default = FALSE, updated_at = NOW()
             WHERE is_default AND id <> $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "UPDATE investor_pack_templates SET is_default = TRUE, updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            TEMPLATE_COLUMNS
        );

        let template = sqlx::query_as::<_, InvestorPackTemplate>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(template_id = %id, "Default investor pack template changed");
        Ok(Some(template))
    }

    pub async fn count_defaults(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM investor_pack_templates WHERE is_default")
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_kind_json() {
        let sections = vec![PackSectionKind::Overview, PackSectionKind::PropertyDetails];
        let json = serde_json::to_string(&sections).unwrap();
        assert_eq!(json, r#"["overview","property_details"]"#);

        let back: Vec<PackSectionKind> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sections);
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(serde_json::from_str::<PackSectionKind>("\"appendix\"").is_err());
    }

    #[test]
    fn test_default_order_has_every_section_once() {
        let mut seen = std::collections::HashSet::new();
        for kind in PackSectionKind::DEFAULT_ORDER {
            assert!(seen.insert(kind));
            assert!(!kind.heading().is_empty());
        }
    }
}
