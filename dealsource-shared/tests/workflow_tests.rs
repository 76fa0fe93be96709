/// Conditional status and stage updates against a live database

mod common;

use dealsource_shared::models::deal::{Deal, DealStatus, StatusHistoryEntry};
use dealsource_shared::models::user::UserRole;
use dealsource_shared::models::vendor::{
    CreateVendor, InboundReply, PipelineStage, Vendor, VendorUrgency,
};
use dealsource_shared::workflow::pipeline::reply_source_stages;

fn vendor(phone: &str) -> CreateVendor {
    CreateVendor {
        first_name: "Val".to_string(),
        last_name: Some("Vendor".to_string()),
        phone: Some(phone.to_string()),
        email: None,
        property_address: "3 Canal Street, Manchester".to_string(),
        postcode: Some("M1 3HE".to_string()),
        urgency: VendorUrgency::High,
        property_condition: None,
        reason_for_sale: Some("Relocating".to_string()),
        asking_price: Some(95_000),
        notes: None,
        assigned_to: None,
    }
}

#[tokio::test]
async fn test_new_deal_has_one_history_entry() {
    let Some(pool) = common::test_pool().await else { return };
    let user = common::create_user(&pool, UserRole::Sourcer, "Dee", "History").await;
    let deal = common::create_deal(&pool, user.id).await;

    assert_eq!(deal.status, DealStatus::Draft);
    assert_eq!(deal.status_history.len(), 1);
    assert_eq!(deal.status_history[0].status, DealStatus::Draft);
    assert_eq!(deal.status_history[0].changed_by, Some(user.id));
}

#[tokio::test]
async fn test_status_change_appends_history() {
    let Some(pool) = common::test_pool().await else { return };
    let user = common::create_user(&pool, UserRole::Sourcer, "Dee", "History").await;
    let deal = common::create_deal(&pool, user.id).await;

    let entry = StatusHistoryEntry::new(DealStatus::Review, Some(user.id), Some("Ready".to_string()));
    let updated = Deal::change_status(&pool, deal.id, DealStatus::Draft, entry)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, DealStatus::Review);
    assert_eq!(updated.status_history.len(), 2);
    assert_eq!(updated.status_history[1].status, DealStatus::Review);
    assert_eq!(updated.status_history[1].note.as_deref(), Some("Ready"));
}

#[tokio::test]
async fn test_status_change_loses_race() {
    let Some(pool) = common::test_pool().await else { return };
    let user = common::create_user(&pool, UserRole::Sourcer, "Dee", "History").await;
    let deal = common::create_deal(&pool, user.id).await;

    let first = StatusHistoryEntry::new(DealStatus::Review, Some(user.id), None);
    let second = StatusHistoryEntry::new(DealStatus::Withdrawn, Some(user.id), None);

    assert!(Deal::change_status(&pool, deal.id, DealStatus::Draft, first).await.unwrap().is_some());
    // still expects draft
    assert!(Deal::change_status(&pool, deal.id, DealStatus::Draft, second).await.unwrap().is_none());

    let current = Deal::find_by_id(&pool, deal.id).await.unwrap().unwrap();
    assert_eq!(current.status, DealStatus::Review);
    assert_eq!(current.status_history.len(), 2);
}

#[tokio::test]
async fn test_vendor_stage_is_conditional() {
    let Some(pool) = common::test_pool().await else { return };
    let created = Vendor::create(&pool, None, vendor("+447700900101")).await.unwrap();

    assert_eq!(created.stage, PipelineStage::NewLead);
    assert!(created.next_contact_at.is_some());

    let moved = Vendor::set_stage(&pool, created.id, PipelineStage::NewLead, PipelineStage::Contacted)
        .await
        .unwrap();
    assert_eq!(moved.unwrap().stage, PipelineStage::Contacted);

    let stale = Vendor::set_stage(&pool, created.id, PipelineStage::NewLead, PipelineStage::Lost)
        .await
        .unwrap();
    assert!(stale.is_none());

    let current = Vendor::find_by_id(&pool, created.id).await.unwrap().unwrap();
    assert_eq!(current.stage, PipelineStage::Contacted);
}

#[tokio::test]
async fn test_inbound_reply_moves_to_responded_and_latches_opt_out() {
    let Some(pool) = common::test_pool().await else { return };
    let created = Vendor::create(&pool, None, vendor("+447700900102")).await.unwrap();
    Vendor::set_stage(&pool, created.id, PipelineStage::NewLead, PipelineStage::Contacted)
        .await
        .unwrap();

    let reply = InboundReply {
        opt_out: true,
        advance_from: reply_source_stages(),
    };
    let updated = Vendor::record_inbound(&pool, created.id, &reply).await.unwrap().unwrap();

    assert_eq!(updated.stage, PipelineStage::Responded);
    assert!(updated.sms_opt_out);
    assert!(updated.last_inbound_at.is_some());

    // a later ordinary reply neither clears opt-out nor moves a responded vendor
    let reply = InboundReply {
        opt_out: false,
        advance_from: reply_source_stages(),
    };
    let updated = Vendor::record_inbound(&pool, created.id, &reply).await.unwrap().unwrap();
    assert_eq!(updated.stage, PipelineStage::Responded);
    assert!(updated.sms_opt_out);
}

#[tokio::test]
async fn test_reply_does_not_move_qualified_vendor() {
    let Some(pool) = common::test_pool().await else { return };
    let created = Vendor::create(&pool, None, vendor("+447700900103")).await.unwrap();
    Vendor::set_stage(&pool, created.id, PipelineStage::NewLead, PipelineStage::Qualified)
        .await
        .unwrap();

    let reply = InboundReply {
        opt_out: false,
        advance_from: reply_source_stages(),
    };
    let updated = Vendor::record_inbound(&pool, created.id, &reply).await.unwrap().unwrap();
    assert_eq!(updated.stage, PipelineStage::Qualified);
}
