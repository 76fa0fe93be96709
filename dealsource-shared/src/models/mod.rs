/// Database models for DealSource
///
/// Each model owns its SQL. Functions take `&PgPool` explicitly; write paths
/// that must be atomic open their own transaction.
///
/// # Models
///
/// - `user`: accounts, roles, password reset state
/// - `deal`: property deals and their status history
/// - `deal_photo`: deal photos and the cover flag
/// - `vendor`: sellers and their SMS pipeline state
/// - `sms_message`: per-vendor SMS log
/// - `investor`: investor relationship records
/// - `investor_pack_template`: pack branding and section order
/// - `property_data_cache`: provider responses and credit metering
///
/// # Example
///
/// ```no_run
/// use dealsource_shared::models::deal::{CreateDeal, Deal};
///
/// # async fn example(pool: sqlx::PgPool, user_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let deal = Deal::create(&pool, user_id, CreateDeal {
///     title: "3-bed semi, Leeds".to_string(),
///     address: "12 Example Road, Leeds".to_string(),
///     ..Default::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod deal;
pub mod deal_photo;
pub mod investor;
pub mod investor_pack_template;
pub mod property_data_cache;
pub mod sms_message;
pub mod user;
pub mod vendor;
