/// Deal photos and cover selection
///
/// At most one photo per deal has `is_cover`. The partial unique index
/// `uq_deal_photos_one_cover` enforces it in the schema; the write paths here
/// lock the parent deal row first so concurrent cover changes queue up behind
/// each other instead of tripping the index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DealPhoto {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub sort_order: i32,
    pub is_cover: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePhoto {
    pub url: String,
    pub caption: Option<String>,
    /// Appended after the existing photos when None
    pub sort_order: Option<i32>,
}

/// Result of a cover change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOutcome {
    Updated,
    DealNotFound,
    PhotoNotFound,
}

/// Locks the deal row for the rest of the transaction
async fn lock_deal(tx: &mut Transaction<'_, Postgres>, deal_id: Uuid) -> Result<bool, sqlx::Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM deals WHERE id = $1 FOR UPDATE")
        .bind(deal_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(row.is_some())
}

impl DealPhoto {
    /// Cover first, then by sort order
    pub async fn list_for_deal(pool: &PgPool, deal_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DealPhoto>(
            r#"
            SELECT id, deal_id, url, caption, sort_order, is_cover, created_at
            FROM deal_photos
            WHERE deal_id = $1
            ORDER BY is_cover DESC, sort_order ASC, created_at ASC
            "#,
        )
        .bind(deal_id)
        .fetch_all(pool)
        .await
    }

    /// Adds a photo; the first photo of a deal becomes its cover
    ///
    /// Returns `None` if the deal does not exist.
    pub async fn create(
        pool: &PgPool,
        deal_id: Uuid,
        data: CreatePhoto,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !lock_deal(&mut tx, deal_id).await? {
            return Ok(None);
        }

        let photo = sqlx::query_as::<_, DealPhoto>(
            r#"
            INSERT INTO deal_photos (deal_id, url, caption, sort_order, is_cover)
            VALUES (
                $1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM deal_photos WHERE deal_id = $1)),
                NOT EXISTS (SELECT 1 FROM deal_photos WHERE deal_id = $1 AND is_cover)
            )
            RETURNING id, deal_id, url, caption, sort_order, is_cover, created_at
            "#,
        )
        .bind(deal_id)
        .bind(data.url)
        .bind(data.caption)
        .bind(data.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(photo))
    }

    /// Deletes a photo of the deal, promoting the next photo if it was the cover
    pub async fn delete(pool: &PgPool, deal_id: Uuid, photo_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !lock_deal(&mut tx, deal_id).await? {
            return Ok(false);
        }

        let deleted: Option<(bool,)> = sqlx::query_as(
            "DELETE FROM deal_photos WHERE id = $1 AND deal_id = $2 RETURNING is_cover",
        )
        .bind(photo_id)
        .bind(deal_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((was_cover,)) = deleted else {
            return Ok(false);
        };

        if was_cover {
            sqlx::query(
                r#"
                UPDATE deal_photos SET is_cover = TRUE
                WHERE id = (
                    SELECT id FROM deal_photos
                    WHERE deal_id = $1
                    ORDER BY sort_order ASC, created_at ASC
                    LIMIT 1
                )
                "#,
            )
            .bind(deal_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Makes `photo_id` the only cover photo of `deal_id`
    ///
    /// Nothing changes unless both the deal and the photo (belonging to that
    /// deal) exist.
    pub async fn set_cover(
        pool: &PgPool,
        deal_id: Uuid,
        photo_id: Uuid,
    ) -> Result<CoverOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if !lock_deal(&mut tx, deal_id).await? {
            return Ok(CoverOutcome::DealNotFound);
        }

        let photo: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM deal_photos WHERE id = $1 AND deal_id = $2")
                .bind(photo_id)
                .bind(deal_id)
                .fetch_optional(&mut *tx)
                .await?;

        if photo.is_none() {
            return Ok(CoverOutcome::PhotoNotFound);
        }

        sqlx::query("UPDATE deal_photos SET is_cover = FALSE WHERE deal_id = $1 AND is_cover AND id <> $2")
            .bind(deal_id)
            .bind(photo_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE deal_photos SET is_cover = TRUE WHERE id = $1")
            .bind(photo_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(deal_id = %deal_id, photo_id = %photo_id, "Cover photo updated");
        Ok(CoverOutcome::Updated)
    }

    /// Number of cover photos a deal has; always 0 or 1
    pub async fn count_covers(pool: &PgPool, deal_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM deal_photos WHERE deal_id = $1 AND is_cover")
                .bind(deal_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}

/// Checks a photo URL against the allowed remote image hosts
///
/// Only `https` URLs (or `http` for `localhost`) whose host is in `allowed`,
/// or a subdomain of an allowed host, are accepted. An empty list allows any
/// https host.
pub fn is_allowed_photo_url(url: &str, allowed: &[String]) -> bool {
    let (scheme, rest) = match url.split_once("://") {
        Some(parts) => parts,
        None => return false,
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    if host.is_empty() {
        return false;
    }

    match scheme {
        "https" => {}
        "http" if host == "localhost" => {}
        _ => return false,
    }

    if allowed.is_empty() {
        return true;
    }

    allowed.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        host == entry || host.ends_with(&format!(".{}", entry))
    })
}
