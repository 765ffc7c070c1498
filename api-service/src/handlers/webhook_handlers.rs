use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use log::{error, info, warn};
use unveil_shared::models::{now_str, DeliveryStatusUpdate};
use unveil_shared::sms::{map_provider_status, twilio::validate_signature};
use unveil_shared::store::MessageStore;

use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-twilio-signature";
/// Status callbacks are a handful of short fields
const MAX_CALLBACK_BYTES: usize = 64 * 1024;

/// Fields of a Twilio message status callback
#[derive(Debug, Default, PartialEq)]
pub struct TwilioStatusCallback {
    pub message_sid: Option<String>,
    pub message_status: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl TwilioStatusCallback {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut callback = TwilioStatusCallback::default();
        for (key, value) in pairs {
            let value = Some(value.clone()).filter(|v| !v.is_empty());
            match key.as_str() {
                "MessageSid" => callback.message_sid = value,
                "MessageStatus" => callback.message_status = value,
                "SmsSid" if callback.message_sid.is_none() => callback.message_sid = value,
                "SmsStatus" if callback.message_status.is_none() => {
                    callback.message_status = value
                }
                "ErrorCode" => callback.error_code = value,
                "ErrorMessage" => callback.error_message = value,
                _ => {}
            }
        }
        callback
    }
}

fn received() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "received": true })))
}

// POST /api/webhooks/twilio
// Always answers 200 so Twilio does not retry; problems are only logged.
pub async fn twilio_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> (StatusCode, Json<serde_json::Value>) {
    let body = match to_bytes(body, MAX_CALLBACK_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Ignoring unreadable Twilio callback body: {}", e);
            return received();
        }
    };

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(&body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if let Some(auth) = &state.twilio_webhook {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !validate_signature(&auth.auth_token, &auth.callback_url, &pairs, signature) {
            warn!("Ignoring Twilio callback with invalid signature");
            return received();
        }
    }

    let callback = TwilioStatusCallback::from_pairs(&pairs);
    let (sid, status) = match (&callback.message_sid, &callback.message_status) {
        (Some(sid), Some(status)) => (sid.clone(), status.clone()),
        _ => {
            warn!("Twilio callback missing MessageSid or MessageStatus: {:?}", callback);
            return received();
        }
    };

    info!("Twilio status callback: sid={}, status={}", sid, status);

    let update = DeliveryStatusUpdate {
        sms_status: map_provider_status(&status),
        error_code: callback.error_code,
        error_message: callback.error_message,
        updated_at: now_str(),
    };

    match state.store.update_delivery_status(&sid, update).await {
        Ok(0) => warn!("No delivery found for Twilio message {}", sid),
        Ok(count) => info!("Updated {} delivery rows for Twilio message {}", count, sid),
        Err(e) => error!("Failed to update delivery for Twilio message {}: {}", sid, e),
    }

    received()
}
