//! Shared helpers for worker tests
//!
//! These suites need a PostgreSQL database reachable through DATABASE_URL.
//! When the variable is unset each test returns early.
//!
//! The queue claims every due vendor in the database, so tests take
//! [`serial`] to keep their ticks from stealing each other's vendors.

#![allow(dead_code)]

use async_trait::async_trait;
use dealsource_shared::db::migrations::run_migrations;
use dealsource_shared::db::pool::{create_pool, DatabaseConfig};
use dealsource_shared::models::vendor::{CreateVendor, Vendor, VendorUrgency};
use dealsource_shared::notify::sms::{SmsError, SmsGateway, SmsReceipt};
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::MutexGuard;
use uuid::Uuid;

static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

pub async fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().await
}

pub async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping database test");
            return None;
        }
    };

    let pool = create_pool(DatabaseConfig {
        url,
        max_connections: 5,
        min_connections: 1,
        ..Default::default()
    })
    .await
    .expect("Failed to connect to test database");

    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

pub fn unique_phone() -> String {
    format!("+447700{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

pub async fn create_vendor(pool: &PgPool, phone: Option<String>) -> Vendor {
    Vendor::create(
        pool,
        None,
        CreateVendor {
            first_name: "Morgan".to_string(),
            last_name: Some("Reid".to_string()),
            phone,
            email: None,
            property_address: "4 Mill Lane, York, YO1 7AA".to_string(),
            postcode: Some("YO1 7AA".to_string()),
            urgency: VendorUrgency::High,
            property_condition: None,
            reason_for_sale: None,
            asking_price: Some(180_000),
            notes: None,
            assigned_to: None,
        },
    )
    .await
    .expect("Failed to create vendor")
}

pub async fn reload(pool: &PgPool, vendor: &Vendor) -> Vendor {
    Vendor::find_by_id(pool, vendor.id)
        .await
        .unwrap()
        .expect("vendor disappeared")
}

/// Accepts everything and remembers what it sent
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingGateway {
    pub fn sent_to(&self, phone: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == phone)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl SmsGateway for RecordingGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, SmsError> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(SmsReceipt {
            provider_message_id: Some(format!("SM{}", Uuid::new_v4().simple())),
        })
    }
}

/// Refuses everything
pub struct FailingGateway;

#[async_trait]
impl SmsGateway for FailingGateway {
    async fn send(&self, _to: &str, _body: &str) -> Result<SmsReceipt, SmsError> {
        Err(SmsError::Rejected {
            status: 400,
            body: "invalid destination".to_string(),
        })
    }
}

/// Accepts the first `accept` messages, then refuses the rest
pub struct FlakyGateway {
    remaining: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
}

impl FlakyGateway {
    pub fn new(accept: usize) -> Self {
        FlakyGateway {
            remaining: AtomicUsize::new(accept),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SmsGateway for FlakyGateway {
    async fn send(&self, to: &str, _body: &str) -> Result<SmsReceipt, SmsError> {
        let accepted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if !accepted {
            return Err(SmsError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        self.sent.lock().unwrap().push(to.to_string());
        Ok(SmsReceipt {
            provider_message_id: Some(format!("SM{}", Uuid::new_v4().simple())),
        })
    }
}
