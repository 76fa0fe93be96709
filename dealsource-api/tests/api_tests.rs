/// End-to-end API tests against a live database
///
/// Each test builds its own router over the database in DATABASE_URL and
/// returns early when it is unset.

mod common;

use axum::http::{header, StatusCode};
use common::*;
use dealsource_shared::models::deal_photo::DealPhoto;
use dealsource_shared::models::investor_pack_template::InvestorPackTemplate;
use dealsource_shared::models::user::{UpdateUser, User, UserRole};
use dealsource_shared::models::vendor::Vendor;
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_deal(ctx: &TestContext, token: &str) -> Value {
    let (status, deal) = call_json(
        &ctx.app,
        send_json(
            "POST",
            "/api/deals",
            Some(token),
            json!({
                "title": "Three-bed semi",
                "address": "22 Orchard Way, Leeds",
                "postcode": "LS8 1AA",
                "askingPrice": 150000,
                "estimatedValue": 180000,
                "refurbCost": 10000,
                "monthlyRent": 950
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", deal);
    deal
}

async fn move_deal(ctx: &TestContext, token: &str, deal_id: &str, status: &str) -> (StatusCode, Value) {
    call_json(
        &ctx.app,
        send_json(
            "POST",
            &format!("/api/deals/{}/status", deal_id),
            Some(token),
            json!({ "status": status }),
        ),
    )
    .await
}

#[tokio::test]
async fn test_login_sets_cookie_and_session() {
    let Some(ctx) = TestContext::new().await else { return };
    let (user, _) = ctx.user(UserRole::Sourcer, "Lou", "Login").await;

    let response = call(
        &ctx.app,
        send_json(
            "POST",
            "/api/auth/login",
            None,
            json!({"email": user.email.to_uppercase(), "password": PASSWORD}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["user"].get("passwordHash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, session) = call_json(&ctx.app, get("/api/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["user"]["role"], "sourcer");

    let (status, _) = call_json(
        &ctx.app,
        send_json(
            "POST",
            "/api/auth/login",
            None,
            json!({"email": user.email, "password": "wrong-password"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_inactive_account_is_403() {
    let Some(ctx) = TestContext::new().await else { return };
    let (user, _) = ctx.user(UserRole::Sourcer, "Ina", "Active").await;

    User::update(
        &ctx.db,
        user.id,
        UpdateUser {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let (status, body) = call_json(
        &ctx.app,
        send_json("POST", "/api/auth/login", None, json!({"email": user.email, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_forgot_password_identical_bodies() {
    let Some(ctx) = TestContext::new().await else { return };
    let (user, _) = ctx.user(UserRole::Sourcer, "Fay", "Forgot").await;

    let (status_known, body_known) = call_json(
        &ctx.app,
        send_json("POST", "/api/auth/forgot-password", None, json!({"email": user.email})),
    )
    .await;

    let (status_unknown, body_unknown) = call_json(
        &ctx.app,
        send_json(
            "POST",
            "/api/auth/forgot-password",
            None,
            json!({"email": format!("nobody-{}@dealsource.test", Uuid::new_v4().simple())}),
        ),
    )
    .await;

    assert_eq!(status_known, StatusCode::OK);
    assert_eq!(status_unknown, StatusCode::OK);
    assert_eq!(body_known, body_unknown);
    assert_eq!(ctx.mailer.count(), 1);
}

#[tokio::test]
async fn test_team_lists_active_staff_in_name_order() {
    let Some(ctx) = TestContext::new().await else { return };
    let tag = Uuid::new_v4().simple().to_string();

    let (_, sourcer_token) = ctx.user(UserRole::Sourcer, &format!("Zed{}", tag), "Alpha").await;
    ctx.user(UserRole::Admin, &format!("Amy{}", tag), "Zulu").await;
    ctx.user(UserRole::Sourcer, &format!("Amy{}", tag), "Baker").await;
    ctx.user(UserRole::Investor, &format!("Ivy{}", tag), "Investor").await;
    let (inactive, _) = ctx.user(UserRole::Sourcer, &format!("Bob{}", tag), "Gone").await;
    User::update(
        &ctx.db,
        inactive.id,
        UpdateUser {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let (status, body) = call_json(&ctx.app, get("/api/users/team", Some(&sourcer_token))).await;
    assert_eq!(status, StatusCode::OK);

    let ours: Vec<(String, String)> = body
        .as_array()
        .unwrap()
        .iter()
        .filter(|member| member["firstName"].as_str().unwrap().ends_with(&tag))
        .map(|member| {
            (
                member["firstName"].as_str().unwrap().to_string(),
                member["lastName"].as_str().unwrap().to_string(),
            )
        })
        .collect();

    assert_eq!(
        ours,
        vec![
            (format!("Amy{}", tag), "Baker".to_string()),
            (format!("Amy{}", tag), "Zulu".to_string()),
            (format!("Zed{}", tag), "Alpha".to_string()),
        ]
    );
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|member| member["role"] != "investor"));
}

#[tokio::test]
async fn test_usage_summary_shape() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, admin) = ctx.user(UserRole::Admin, "Ada", "Usage").await;

    let (status, body) = call_json(&ctx.app, get("/api/propertydata/usage", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);

    let used = body["creditsUsed"].as_i64().unwrap();
    assert_eq!(body["limit"], 2000);
    assert_eq!(body["creditsRemaining"].as_i64().unwrap(), (2000 - used).max(0));
    assert!(body["requestsThisMonth"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn test_deal_status_workflow_over_http() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, sourcer) = ctx.user(UserRole::Sourcer, "Sam", "Sourcer").await;
    let (_, admin) = ctx.user(UserRole::Admin, "Ann", "Admin").await;

    let deal = create_deal(&ctx, &sourcer).await;
    let id = deal["id"].as_str().unwrap().to_string();
    assert_eq!(deal["status"], "draft");
    assert_eq!(deal["statusHistory"].as_array().unwrap().len(), 1);

    let (status, _) = move_deal(&ctx, &sourcer, &id, "sold").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = move_deal(&ctx, &sourcer, &id, "review").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusHistory"].as_array().unwrap().len(), 2);

    let (status, _) = move_deal(&ctx, &sourcer, &id, "available").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = move_deal(&ctx, &admin, &id, "available").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "available");
    assert_eq!(body["statusHistory"].as_array().unwrap().len(), 3);

    let (status, portal) = call_json(&ctx.app, get("/api/portal/deals", Some(&token(UserRole::Investor)))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(portal.as_array().unwrap().iter().any(|d| d["id"] == id.as_str()));
}

#[tokio::test]
async fn test_sourcer_cannot_edit_someone_elses_deal() {
    let Some(ctx) = TestContext::new().await else { return };
    let (owner, owner_token) = ctx.user(UserRole::Sourcer, "Olga", "Owner").await;
    let (_, other) = ctx.user(UserRole::Sourcer, "Otto", "Other").await;

    let deal = create_deal(&ctx, &owner_token).await;
    let id = deal["id"].as_str().unwrap();

    let (status, _) = call_json(
        &ctx.app,
        send_json("PATCH", &format!("/api/deals/{}", id), Some(&owner_token), json!({"assignedTo": owner.id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call_json(
        &ctx.app,
        send_json("PATCH", &format!("/api/deals/{}", id), Some(&other), json!({"title": "Mine now"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cover_photo_endpoint() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, sourcer) = ctx.user(UserRole::Sourcer, "Cora", "Cover").await;

    let deal = create_deal(&ctx, &sourcer).await;
    let deal_id = deal["id"].as_str().unwrap().to_string();

    let mut photo_ids = Vec::new();
    for n in 1..=2 {
        let (status, photo) = call_json(
            &ctx.app,
            send_json(
                "POST",
                &format!("/api/deals/{}/photos", deal_id),
                Some(&sourcer),
                json!({"url": format!("https://images.dealsource.test/{}.jpg", n)}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", photo);
        photo_ids.push(photo["id"].as_str().unwrap().to_string());
    }

    let (status, _) = call_json(
        &ctx.app,
        send_json(
            "POST",
            &format!("/api/deals/{}/photos", deal_id),
            Some(&sourcer),
            json!({"url": "https://elsewhere.example.com/x.jpg"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call_json(
        &ctx.app,
        send_json(
            "PUT",
            &format!("/api/deals/{}/photos/{}/cover", deal_id, photo_ids[1]),
            Some(&sourcer),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let deal_uuid: Uuid = deal_id.parse().unwrap();
    let photos = DealPhoto::list_for_deal(&ctx.db, deal_uuid).await.unwrap();
    let covers: Vec<_> = photos.iter().filter(|p| p.is_cover).collect();
    assert_eq!(covers.len(), 1);
    assert_eq!(covers[0].id.to_string(), photo_ids[1]);

    let (status, _) = call_json(
        &ctx.app,
        send_json(
            "PUT",
            &format!("/api/deals/{}/photos/{}/cover", deal_id, Uuid::new_v4()),
            Some(&sourcer),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(DealPhoto::count_covers(&ctx.db, deal_uuid).await.unwrap(), 1);
}

#[tokio::test]
async fn test_set_default_template_endpoint() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, sourcer) = ctx.user(UserRole::Sourcer, "Tia", "Template").await;

    let (status, template) = call_json(
        &ctx.app,
        send_json(
            "POST",
            "/api/investor-pack-templates",
            Some(&sourcer),
            json!({"name": "Compact", "sections": ["overview", "financials"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = template["id"].as_str().unwrap();

    let (status, body) = call_json(
        &ctx.app,
        send_json(
            "POST",
            &format!("/api/investor-pack-templates/{}/set-default", id),
            Some(&sourcer),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["template"]["id"], id);
    assert_eq!(body["template"]["isDefault"], true);
    assert!(InvestorPackTemplate::count_defaults(&ctx.db).await.unwrap() <= 1);

    let (status, _) = call_json(
        &ctx.app,
        send_json(
            "POST",
            &format!("/api/investor-pack-templates/{}/set-default", Uuid::new_v4()),
            Some(&sourcer),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_investor_pack_download() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, sourcer) = ctx.user(UserRole::Sourcer, "Pia", "Pack").await;
    let investor = token(UserRole::Investor);

    let deal = create_deal(&ctx, &sourcer).await;
    let id = deal["id"].as_str().unwrap();
    let uri = format!("/api/deals/{}/investor-pack", id);

    let response = call(&ctx.app, get(&uri, Some(&sourcer))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"investor-pack-three-bed-semi.pdf\""
    );
    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"%PDF-1.4"));

    // still a draft, so hidden from investors
    let (status, _) = call_json(&ctx.app, get(&uri, Some(&investor))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call_json(
        &ctx.app,
        get(&format!("/api/deals/{}/investor-pack", Uuid::new_v4()), Some(&sourcer)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_vendor_stage_and_inbound_sms() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, sourcer) = ctx.user(UserRole::Sourcer, "Vic", "Vendor").await;
    let local = format!("07700 9{:05}", Uuid::new_v4().as_u128() % 100_000);

    let (status, vendor) = call_json(
        &ctx.app,
        send_json(
            "POST",
            "/api/vendors",
            Some(&sourcer),
            json!({"firstName": "Rita", "phone": local, "propertyAddress": "9 Canal St", "urgency": "high"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", vendor);
    assert_eq!(vendor["stage"], "new_lead");
    assert!(vendor["phone"].as_str().unwrap().starts_with("+447700"));
    let id: Uuid = vendor["id"].as_str().unwrap().parse().unwrap();

    let (status, _) = call_json(
        &ctx.app,
        send_json("PUT", &format!("/api/vendors/{}/stage", id), Some(&sourcer), json!({"stage": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut request = send_json("POST", "/api/webhooks/sms", None, json!({"from": local, "body": "Stop"}));
    request
        .headers_mut()
        .insert("x-webhook-secret", WEBHOOK_SECRET.parse().unwrap());
    let (status, ack) = call_json(&ctx.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["vendorId"], id.to_string());

    let stored = Vendor::find_by_id(&ctx.db, id).await.unwrap().unwrap();
    assert!(stored.sms_opt_out);
    assert_eq!(stored.stage.as_str(), "responded");

    let (status, messages) =
        call_json(&ctx.app, get(&format!("/api/vendors/{}/messages", id), Some(&sourcer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["direction"], "inbound");
}

#[tokio::test]
async fn test_profile_password_change_requires_current() {
    let Some(ctx) = TestContext::new().await else { return };
    let (_, token) = ctx.user(UserRole::Investor, "Pat", "Profile").await;

    let (status, _) = call_json(
        &ctx.app,
        send_json("PATCH", "/api/users/me", Some(&token), json!({"newPassword": "Another-Strong-9"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call_json(
        &ctx.app,
        send_json(
            "PATCH",
            "/api/users/me",
            Some(&token),
            json!({"currentPassword": "nope", "newPassword": "Another-Strong-9"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call_json(
        &ctx.app,
        send_json(
            "PATCH",
            "/api/users/me",
            Some(&token),
            json!({"currentPassword": PASSWORD, "newPassword": "Another-Strong-9", "firstName": "Patricia"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstName"], "Patricia");
}
