/// Inbound SMS webhook
///
/// `POST /api/webhooks/sms` is called by the SMS provider for every reply.
/// It is authenticated with the `X-Webhook-Secret` header rather than a
/// session. The body may be a provider form post or JSON. Replies from
/// unknown numbers are acknowledged and dropped so the provider does not
/// retry them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::FormOrJson,
};
use axum::{extract::State, http::HeaderMap, Json};
use dealsource_shared::{
    models::{
        sms_message::{NewSmsMessage, SmsMessage},
        vendor::{InboundReply, SmsDirection, SmsStatus, Vendor},
    },
    notify::sms::{is_opt_out, normalize_phone},
    workflow::pipeline::reply_source_stages,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Deserialize)]
pub struct InboundSms {
    #[serde(alias = "From")]
    pub from: String,

    #[serde(alias = "Body")]
    pub body: String,

    #[serde(default, alias = "MessageSid", rename = "messageId")]
    pub message_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundAck {
    pub received: bool,
    pub vendor_id: Option<Uuid>,
}

/// Length-independent comparison of the shared secret
fn secret_matches(given: &[u8], expected: &[u8]) -> bool {
    given.len() == expected.len()
        && given
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn check_secret(headers: &HeaderMap, expected: Option<&str>) -> ApiResult<()> {
    let expected = expected.ok_or_else(|| {
        ApiError::ServiceUnavailable("SMS webhook is not configured".to_string())
    })?;

    let given = headers
        .get(WEBHOOK_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if secret_matches(given, expected.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Invalid webhook secret".to_string()))
    }
}

pub async fn inbound_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormOrJson(sms): FormOrJson<InboundSms>,
) -> ApiResult<Json<InboundAck>> {
    check_secret(&headers, state.config.sms_webhook_secret.as_deref())?;

    let Some(phone) = normalize_phone(&sms.from) else {
        tracing::warn!(from = %sms.from, "Inbound SMS from unparseable number");
        return Ok(Json(InboundAck { received: true, vendor_id: None }));
    };

    let Some(vendor) = Vendor::find_by_phone(&state.db, &phone).await? else {
        tracing::info!(phone = %phone, "Inbound SMS from unknown number");
        return Ok(Json(InboundAck { received: true, vendor_id: None }));
    };

    SmsMessage::create(
        &state.db,
        NewSmsMessage {
            vendor_id: vendor.id,
            direction: SmsDirection::Inbound,
            body: sms.body.clone(),
            status: SmsStatus::Received,
            provider_message_id: sms.message_id,
            error: None,
        },
    )
    .await?;

    let reply = InboundReply {
        opt_out: is_opt_out(&sms.body),
        advance_from: reply_source_stages(),
    };

    let updated = Vendor::record_inbound(&state.db, vendor.id, &reply)
        .await?
        .ok_or_else(|| ApiError::NotFound("Vendor not found".to_string()))?;

    tracing::info!(
        vendor_id = %vendor.id,
        from_stage = %vendor.stage,
        stage = %updated.stage,
        opt_out = reply.opt_out,
        "Inbound SMS recorded"
    );

    Ok(Json(InboundAck {
        received: true,
        vendor_id: Some(vendor.id),
    }))
}
